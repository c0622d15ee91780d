//! Project-wide, type-safe wrappers, enums, and *very* simple structures
//! which identify or name control-plane concepts, and must be referenced
//! from multiple different crates.

mod contract;
mod domain;
mod names;
mod spec;
mod status;
mod tenant;

pub use contract::{
    master_contract, CONTRACT_COLUMNS, LOADED_AT, RAW_DATA_PAYLOAD, SOURCE_PLATFORM,
    SOURCE_SCHEMA, SOURCE_SCHEMA_HASH, TENANT_SKEY, TENANT_SLUG,
};
pub use domain::{CanonicalColumn, CompositionStyle, Domain, TableKind};
pub use names::{ObjectName, SourcePlatform, TenantSlug};
pub use spec::{
    intermediate_name, landed_relation, source_shim_name, staging_name, star_name, Layer,
    Materialization, ModelSpec, PostHook,
};
pub use status::{Readiness, ReadinessStatus, RunResult, RunStatus};
pub use tenant::{IdentityStrategy, SourceLogic, SourceSettings, TenantConfig, TenantStatus};
