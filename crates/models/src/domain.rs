use serde::{Deserialize, Serialize};
use sqlgen::SqlType;

/// One column of a domain's canonical schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanonicalColumn {
    pub name: &'static str,
    pub ty: SqlType,
}

const fn col(name: &'static str, ty: SqlType) -> CanonicalColumn {
    CanonicalColumn { name, ty }
}

/// Whether a domain materializes as a fact or dimension table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableKind {
    Fact,
    Dim,
}

impl TableKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TableKind::Fact => "fct",
            TableKind::Dim => "dim",
        }
    }
}

/// How a domain's factory composes engines for a tenant's source mix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompositionStyle {
    /// UNION ALL over every enabled source with a matching engine.
    UnionAll,
    /// Exactly one enabled analytics source may contribute.
    SingleAnalyticsSource,
}

/// An analytic domain: one canonical schema, one star-schema table per
/// tenant. All engines of a domain emit this schema bit-exactly, which is
/// what makes the factory's UNION ALL well-typed.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    AdPerformance,
    Orders,
    Sessions,
    Events,
    Campaigns,
    Products,
    Users,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::AdPerformance,
        Domain::Orders,
        Domain::Sessions,
        Domain::Events,
        Domain::Campaigns,
        Domain::Products,
        Domain::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::AdPerformance => "ad_performance",
            Domain::Orders => "orders",
            Domain::Sessions => "sessions",
            Domain::Events => "events",
            Domain::Campaigns => "campaigns",
            Domain::Products => "products",
            Domain::Users => "users",
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Domain::AdPerformance | Domain::Orders | Domain::Sessions | Domain::Events => {
                TableKind::Fact
            }
            Domain::Campaigns | Domain::Products | Domain::Users => TableKind::Dim,
        }
    }

    pub fn composition(&self) -> CompositionStyle {
        match self {
            Domain::AdPerformance | Domain::Orders | Domain::Campaigns | Domain::Products => {
                CompositionStyle::UnionAll
            }
            Domain::Sessions | Domain::Events | Domain::Users => {
                CompositionStyle::SingleAnalyticsSource
            }
        }
    }

    /// The fixed canonical column list of this domain.
    ///
    /// Sessions additionally carry per-tenant funnel columns
    /// (`funnel_max_step` and one pivot per configured step), which are
    /// appended by the engine and factory from the tenant's configuration.
    pub fn canonical_columns(&self) -> &'static [CanonicalColumn] {
        match self {
            Domain::AdPerformance => AD_PERFORMANCE,
            Domain::Orders => ORDERS,
            Domain::Sessions => SESSIONS,
            Domain::Events => EVENTS,
            Domain::Campaigns => CAMPAIGNS,
            Domain::Products => PRODUCTS,
            Domain::Users => USERS,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const AD_PERFORMANCE: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("report_date", SqlType::Date),
    col("campaign_id", SqlType::Varchar),
    col("ad_group_id", SqlType::Varchar),
    col("ad_id", SqlType::Varchar),
    col("spend", SqlType::Double),
    col("impressions", SqlType::BigInt),
    col("clicks", SqlType::BigInt),
    col("conversions", SqlType::Double),
];

const ORDERS: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("order_id", SqlType::Varchar),
    col("order_date", SqlType::Timestamp),
    col("total_price", SqlType::Double),
    col("currency", SqlType::Varchar),
    col("financial_status", SqlType::Varchar),
    col("customer_email", SqlType::Varchar),
    col("customer_id", SqlType::Varchar),
    col("line_items_json", SqlType::Json),
];

const SESSIONS: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("session_id", SqlType::Varchar),
    col("user_pseudo_id", SqlType::Varchar),
    col("user_id", SqlType::Varchar),
    col("session_start_ts", SqlType::Timestamp),
    col("session_end_ts", SqlType::Timestamp),
    col("session_duration_seconds", SqlType::Double),
    col("events_in_session", SqlType::BigInt),
    col("traffic_source", SqlType::Varchar),
    col("traffic_medium", SqlType::Varchar),
    col("traffic_campaign", SqlType::Varchar),
    col("geo_country", SqlType::Varchar),
    col("device_category", SqlType::Varchar),
    col("is_conversion_session", SqlType::Boolean),
    col("session_revenue", SqlType::Double),
    col("transaction_id", SqlType::Varchar),
];

const EVENTS: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("event_name", SqlType::Varchar),
    col("event_timestamp", SqlType::Timestamp),
    col("user_pseudo_id", SqlType::Varchar),
    col("user_id", SqlType::Varchar),
    col("session_id", SqlType::Varchar),
    col("order_id", SqlType::Varchar),
    col("order_total", SqlType::Double),
    col("traffic_source", SqlType::Varchar),
    col("traffic_medium", SqlType::Varchar),
    col("traffic_campaign", SqlType::Varchar),
    col("geo_country", SqlType::Varchar),
    col("device_category", SqlType::Varchar),
];

const CAMPAIGNS: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("campaign_id", SqlType::Varchar),
    col("campaign_name", SqlType::Varchar),
    col("campaign_status", SqlType::Varchar),
];

const PRODUCTS: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("product_id", SqlType::Varchar),
    col("product_title", SqlType::Varchar),
    col("product_price", SqlType::Double),
    col("created_at", SqlType::Timestamp),
];

const USERS: &[CanonicalColumn] = &[
    col("tenant_slug", SqlType::Varchar),
    col("source_platform", SqlType::Varchar),
    col("user_pseudo_id", SqlType::Varchar),
    col("user_id", SqlType::Varchar),
    col("customer_email", SqlType::Varchar),
    col("customer_id", SqlType::Varchar),
    col("is_customer", SqlType::Boolean),
    col("first_seen_at", SqlType::Timestamp),
    col("last_seen_at", SqlType::Timestamp),
    col("total_events", SqlType::BigInt),
    col("total_sessions", SqlType::BigInt),
    col("first_geo_country", SqlType::Varchar),
    col("first_device_category", SqlType::Varchar),
];
