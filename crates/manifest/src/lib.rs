//! The tenants manifest store: an ordered `tenant_slug -> TenantConfig`
//! map persisted as YAML. Read by nearly every component, written only by
//! the orchestrator and the onboarding surface. Readers get immutable
//! snapshots; writers hold an exclusive lock and rewrite the file
//! atomically.

mod history;

pub use history::{record_history, HISTORY_TABLE};

use indexmap::IndexMap;
use models::{TenantConfig, TenantSlug, TenantStatus};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read tenants manifest at {path}")]
    Read {
        path: String,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to write tenants manifest at {path}")]
    Write {
        path: String,
        #[source]
        err: std::io::Error,
    },
    #[error("tenants manifest at {path} is malformed")]
    Parse {
        path: String,
        #[source]
        err: serde_yaml::Error,
    },
    #[error("unknown tenant {slug}")]
    UnknownTenant { slug: String },
    #[error(transparent)]
    Warehouse(#[from] warehouse::Error),
}

/// On-disk shape: an ordered list, so declaration order survives the
/// round-trip byte-for-byte.
#[derive(Serialize, Deserialize, Default)]
struct ManifestFile {
    tenants: Vec<TenantConfig>,
}

type Snapshot = Arc<IndexMap<TenantSlug, TenantConfig>>;

pub struct ManifestStore {
    path: PathBuf,
    state: RwLock<Snapshot>,
}

impl ManifestStore {
    /// Open the manifest at `path`. A missing file is an empty manifest.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let map = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let file: ManifestFile =
                    serde_yaml::from_str(&text).map_err(|err| Error::Parse {
                        path: path.display().to_string(),
                        err,
                    })?;
                file.tenants
                    .into_iter()
                    .map(|config| (config.tenant_slug.clone(), config))
                    .collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(err) => {
                return Err(Error::Read {
                    path: path.display().to_string(),
                    err,
                })
            }
        };

        Ok(Self {
            path,
            state: RwLock::new(Arc::new(map)),
        })
    }

    /// A consistent, immutable snapshot of every tenant, in insertion
    /// order. Lock-free for subsequent reads.
    pub fn snapshot(&self) -> Snapshot {
        self.state
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn get(&self, slug: &TenantSlug) -> Option<TenantConfig> {
        self.snapshot().get(slug).cloned()
    }

    pub fn list(&self) -> Vec<TenantConfig> {
        self.snapshot().values().cloned().collect()
    }

    /// Insert or overwrite a tenant. Existing slugs keep their position;
    /// new slugs append, preserving reproducible run order.
    pub fn upsert(&self, config: TenantConfig) -> Result<(), Error> {
        self.mutate(|map| {
            map.insert(config.tenant_slug.clone(), config);
            Ok(())
        })
    }

    pub fn mark_status(&self, slug: &TenantSlug, status: TenantStatus) -> Result<TenantConfig, Error> {
        self.mutate(|map| match map.get_mut(slug) {
            Some(config) => {
                config.status = status;
                Ok(config.clone())
            }
            None => Err(Error::UnknownTenant {
                slug: slug.to_string(),
            }),
        })
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut IndexMap<TenantSlug, TenantConfig>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poison| poison.into_inner());

        let mut map = (**guard).clone();
        let out = f(&mut map)?;
        self.persist(&map)?;
        *guard = Arc::new(map);
        Ok(out)
    }

    /// Atomic rewrite: serialize to a sibling temp file, then rename over
    /// the manifest so readers never observe a torn file.
    fn persist(&self, map: &IndexMap<TenantSlug, TenantConfig>) -> Result<(), Error> {
        let file = ManifestFile {
            tenants: map.values().cloned().collect(),
        };
        let text = serde_yaml::to_string(&file).map_err(|err| Error::Parse {
            path: self.path.display().to_string(),
            err,
        })?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let io_err = |err| Error::Write {
            path: self.path.display().to_string(),
            err,
        };

        std::fs::create_dir_all(parent).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path)
            .map_err(|err| io_err(err.error))?;

        tracing::debug!(path = %self.path.display(), tenants = map.len(), "persisted tenants manifest");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use models::{SourcePlatform, SourceSettings};

    fn config(slug: &str) -> TenantConfig {
        let mut config = TenantConfig::new(TenantSlug::new(slug), slug.to_uppercase());
        config.sources.insert(
            SourcePlatform::new("shopify"),
            SourceSettings {
                enabled: true,
                logic: Default::default(),
            },
        );
        config
    }

    #[test]
    fn upserts_preserve_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("tenants.yaml")).unwrap();

        store.upsert(config("wallace")).unwrap();
        store.upsert(config("tyrell_corp")).unwrap();
        store.upsert(config("atari")).unwrap();
        // Overwriting keeps the original position.
        store.upsert(config("tyrell_corp")).unwrap();

        let slugs: Vec<String> = store
            .list()
            .iter()
            .map(|c| c.tenant_slug.to_string())
            .collect();
        assert_eq!(slugs, vec!["wallace", "tyrell_corp", "atari"]);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.yaml");

        let store = ManifestStore::open(&path).unwrap();
        store.upsert(config("tyrell_corp")).unwrap();
        store
            .mark_status(&TenantSlug::new("tyrell_corp"), TenantStatus::Active)
            .unwrap();
        drop(store);

        let store = ManifestStore::open(&path).unwrap();
        let loaded = store.get(&TenantSlug::new("tyrell_corp")).unwrap();
        assert_eq!(loaded.status, TenantStatus::Active);
        assert_eq!(loaded.business_name, "TYRELL_CORP");
    }

    #[test]
    fn snapshots_are_immutable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("tenants.yaml")).unwrap();

        store.upsert(config("wallace")).unwrap();
        let before = store.snapshot();
        store.upsert(config("atari")).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn marking_an_unknown_tenant_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("tenants.yaml")).unwrap();

        match store.mark_status(&TenantSlug::new("nobody"), TenantStatus::Active) {
            Err(Error::UnknownTenant { slug }) => assert_eq!(slug, "nobody"),
            other => panic!("expected UnknownTenant, got {other:?}"),
        }
    }
}
