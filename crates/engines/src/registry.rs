use models::{Domain, SourcePlatform, TenantConfig, TenantSlug};
use sqlgen::Select;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything an engine may consult while building its row stream: the
/// tenant's manifest entry, including per-source logic overrides.
pub struct EngineContext<'a> {
    pub config: &'a TenantConfig,
}

impl<'a> EngineContext<'a> {
    pub fn new(config: &'a TenantConfig) -> Self {
        Self { config }
    }

    pub fn tenant(&self) -> &TenantSlug {
        &self.config.tenant_slug
    }
}

/// One engine: a canonical-schema row stream over one source platform's
/// intermediate rows, for one analytic domain.
pub trait Engine: Send + Sync {
    fn source(&self) -> SourcePlatform;
    fn domain(&self) -> Domain;
    /// Intermediate relations this engine reads for the given tenant.
    fn requires(&self, ctx: &EngineContext) -> Vec<String>;
    /// The canonical row stream. Column names and order follow the
    /// domain's canonical schema exactly.
    fn build(&self, ctx: &EngineContext) -> Select;
}

/// The explicit `(source_platform, domain) -> engine` map, assembled once
/// at startup.
pub struct EngineRegistry {
    engines: BTreeMap<(String, Domain), Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// The full standard library of engines shipped with this release.
    pub fn standard() -> Self {
        let mut registry = Self {
            engines: BTreeMap::new(),
        };
        for engine in super::ads::engines() {
            registry.register(engine);
        }
        for engine in super::commerce::engines() {
            registry.register(engine);
        }
        for engine in super::analytics::engines() {
            registry.register(engine);
        }
        for engine in super::users::engines() {
            registry.register(engine);
        }
        registry
    }

    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        let key = (engine.source().to_string(), engine.domain());
        self.engines.insert(key, engine);
    }

    pub fn get(&self, source: &SourcePlatform, domain: Domain) -> Option<&dyn Engine> {
        self.engines
            .get(&(source.to_string(), domain))
            .map(Arc::as_ref)
    }

    /// Source platforms providing analytics domains (those with a
    /// sessions engine).
    pub fn is_analytics_source(&self, source: &SourcePlatform) -> bool {
        self.get(source, Domain::Sessions).is_some()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_registry_covers_the_supported_matrix() {
        let registry = EngineRegistry::standard();

        // 7 ad platforms x (ad_performance + campaigns), 3 commerce
        // platforms x (orders + products), 2 analytics platforms x
        // (sessions + events + users).
        assert_eq!(registry.len(), 7 * 2 + 3 * 2 + 2 * 3);

        let fb = SourcePlatform::new("facebook_ads");
        assert!(registry.get(&fb, Domain::AdPerformance).is_some());
        assert!(registry.get(&fb, Domain::Orders).is_none());

        assert!(registry.is_analytics_source(&SourcePlatform::new("google_analytics")));
        assert!(registry.is_analytics_source(&SourcePlatform::new("mixpanel")));
        assert!(!registry.is_analytics_source(&SourcePlatform::new("shopify")));
    }
}
