//! The connector catalog and its routing machinery: the static enumeration
//! of supported source objects, the schema fingerprint engine, and the
//! warehouse-backed blueprint registry which maps fingerprints to master
//! model ids.

mod connectors;
mod fingerprint;
mod registry;

pub use connectors::{list_supported, ConnectorEntry};
pub use fingerprint::{
    fingerprint, fingerprint_tenant, is_etl_column, normalize_type, ETL_COLUMNS,
};
pub use registry::{
    closest_blueprint, initialize, load_all, lookup, BlueprintRow, ClosestBlueprint, Error,
    BLUEPRINT_TABLE,
};
