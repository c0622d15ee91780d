//! The pipeline orchestrator: drives tenant onboarding end to end
//! (ingestion, scaffolding, model-graph compilation, two-pass
//! materialization, observability, the status flip) and hosts the thin
//! HTTP surface the frontend consumes.

pub mod api;
mod graph;
mod ingest;
mod materialize;
mod observe;
mod pipeline;
mod status;

pub use graph::ModelGraph;
pub use ingest::{CommandIngestor, Ingestor, NoopIngestor};
pub use materialize::{execute_pass, ExecOptions, PassReport};
pub use observe::{
    record_run, run_data_tests, DataTest, TestOutcome, MODEL_ARTIFACTS, RUN_RESULTS,
    TEST_ARTIFACTS,
};
pub use pipeline::{OnboardOutcome, Orchestrator, Settings};
pub use status::StatusBoard;

/// Everything that can sink a tenant onboarding run.
#[derive(Debug, thiserror::Error)]
pub enum OnboardError {
    #[error("tenant {slug} is not present in the tenants manifest")]
    UnknownTenant { slug: String },
    #[error("ingestion failed for source {source_name}: {message}")]
    Ingest { source_name: String, message: String },
    #[error("model graph contains a cycle through {nodes:?}")]
    Cycle { nodes: Vec<String> },
    #[error("run cancelled")]
    Cancelled,
    #[error("{failed} of {total} models did not materialize")]
    ModelsFailed { failed: usize, total: usize },
    #[error("{failed} of {total} data tests failed")]
    DataTestsFailed { failed: usize, total: usize },
    #[error(transparent)]
    Scaffold(#[from] scaffold::Error),
    #[error(transparent)]
    Registry(#[from] catalog::Error),
    #[error(transparent)]
    Factory(#[from] engines::Error),
    #[error(transparent)]
    Warehouse(#[from] warehouse::Error),
    #[error(transparent)]
    Manifest(#[from] manifest::Error),
}

impl OnboardError {
    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            OnboardError::Scaffold(scaffold::Error::UnknownSchema { .. }) => 2,
            OnboardError::Registry(catalog::Error::Collision { .. }) => 3,
            OnboardError::Warehouse(_)
            | OnboardError::Scaffold(_)
            | OnboardError::Registry(_) => 4,
            OnboardError::Cancelled => 5,
            _ => 1,
        }
    }
}
