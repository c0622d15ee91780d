use models::{Readiness, ReadinessStatus, TenantSlug};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Shared provisioning state per tenant, fed by the orchestrator and read
/// by the readiness endpoint.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<BTreeMap<String, Readiness>>>,
}

impl StatusBoard {
    pub fn update(&self, tenant: &TenantSlug, status: ReadinessStatus, message: Option<String>) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        let entry = guard.entry(tenant.to_string()).or_default();
        entry.status = status;
        entry.is_ready = status == ReadinessStatus::Ready;
        entry.message = message;
    }

    pub fn set_load_id(&self, tenant: &TenantSlug, load_id: String) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        guard.entry(tenant.to_string()).or_default().last_load_id = Some(load_id);
    }

    pub fn get(&self, tenant: &TenantSlug) -> Readiness {
        self.inner
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(tenant.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tracks_progress_and_load_id() {
        let board = StatusBoard::default();
        let tenant = TenantSlug::new("acme");

        assert_eq!(board.get(&tenant).status, ReadinessStatus::Starting);

        board.update(&tenant, ReadinessStatus::Modeling, None);
        board.set_load_id(&tenant, "inv-1".to_string());
        board.update(&tenant, ReadinessStatus::Ready, None);

        let readiness = board.get(&tenant);
        assert!(readiness.is_ready);
        assert_eq!(readiness.last_load_id.as_deref(), Some("inv-1"));
    }
}
