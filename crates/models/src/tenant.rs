use super::{SourcePlatform, TenantSlug};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tenant.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[default]
    Onboarding,
    Active,
    Disabled,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Onboarding => "onboarding",
            TenantStatus::Active => "active",
            TenantStatus::Disabled => "disabled",
        }
    }
}

/// Per-tenant identity-resolution strategy for joining analytics users to
/// ecommerce orders.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStrategy {
    /// Analytics `transaction_id` equals the stringified order id.
    TransactionIdMatch,
    /// Analytics email equals the order billing email.
    EmailMatch,
}

/// Free-form per-source table logic: conversion events, funnel step
/// mappings, identity resolution.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceLogic {
    /// Event names which mark a session as a conversion session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversion_events: Vec<String>,
    /// Ordered event names of the tenant's funnel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funnel_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_resolution: Option<IdentityStrategy>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "source_logic_is_empty")]
    pub logic: SourceLogic,
}

fn source_logic_is_empty(logic: &SourceLogic) -> bool {
    logic == &SourceLogic::default()
}

/// One tenant's manifest entry: enabled sources in declaration order,
/// per-source logic, and lifecycle status. Declaration order is load
/// bearing: it fixes the iteration order of factory UNION branches.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    pub tenant_slug: TenantSlug,
    pub business_name: String,
    #[serde(default)]
    pub status: TenantStatus,
    #[serde(default)]
    pub sources: IndexMap<SourcePlatform, SourceSettings>,
}

impl TenantConfig {
    pub fn new(slug: TenantSlug, business_name: impl Into<String>) -> Self {
        Self {
            tenant_slug: slug,
            business_name: business_name.into(),
            status: TenantStatus::Onboarding,
            sources: IndexMap::new(),
        }
    }

    /// Enabled sources, in manifest declaration order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourcePlatform> {
        self.sources
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(platform, _)| platform)
    }

    pub fn source_logic(&self, platform: &SourcePlatform) -> Option<&SourceLogic> {
        self.sources.get(platform).map(|s| &s.logic)
    }
}
