//! The scaffolder: given a landed source table, resolve its blueprint and
//! emit the generated models which wire it into the push circuit (the
//! master-sink ensure, the source shim, and the staging view carrying the
//! push hook), plus the intermediate unpacker which turns master payloads
//! back into typed rows.

mod artifacts;
mod staging;
mod unpacker;

pub use artifacts::write_artifacts;
pub use staging::{scaffold_landed_table, ScaffoldOutput};
pub use unpacker::{extraction_spec_from_schema, intermediate_model, ExtractColumn};

use catalog::ClosestBlueprint;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "no registered blueprint matches {table} (tenant {tenant}); \
         observed columns {observed:?}; closest known blueprint: {closest:?}"
    )]
    UnknownSchema {
        tenant: String,
        table: String,
        observed: Vec<(String, String)>,
        closest: Option<ClosestBlueprint>,
    },
    #[error(transparent)]
    Registry(#[from] catalog::Error),
    #[error(transparent)]
    Warehouse(#[from] warehouse::Error),
    #[error("failed to write artifact {path}")]
    Artifact {
        path: String,
        #[source]
        err: std::io::Error,
    },
}
