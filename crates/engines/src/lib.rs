//! The engine library and factory resolver.
//!
//! An engine turns one source platform's intermediate rows into the
//! canonical row stream of one analytic domain. A factory composes the
//! engines matching a tenant's enabled sources into that tenant's star
//! schema table: UNION ALL for multi-source domains, single-source pick
//! for analytics domains, and a typed empty result when nothing matches.
//!
//! Engines are looked up through an explicit map registered at startup,
//! not by constructed names: a missing entry is the typed-empty branch,
//! never a failure.

mod ads;
mod analytics;
mod commerce;
mod factory;
mod registry;
mod users;

pub use analytics::funnel_columns;
pub use factory::{build_star_model, typed_empty};
pub use registry::{Engine, EngineContext, EngineRegistry};

use models::Domain;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "domain {domain} admits a single analytics source, but tenant {tenant} \
         has {sources:?} enabled"
    )]
    AmbiguousAnalyticsSource {
        tenant: String,
        domain: Domain,
        sources: Vec<String>,
    },
}
