use super::{Domain, ObjectName, SourcePlatform, TableKind, TenantSlug};
use sqlgen::Relation;

/// Pipeline layer of a generated model. Layers name artifact directories
/// and drive the reporting-pass (pass B) subtree selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Source,
    Staging,
    MasterSink,
    Intermediate,
    Mart,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Source => "source",
            Layer::Staging => "staging",
            Layer::MasterSink => "master",
            Layer::Intermediate => "intermediate",
            Layer::Mart => "mart",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Materialization {
    View,
    Table,
    /// Idempotent CREATE IF NOT EXISTS; the relation is never dropped or
    /// recreated by the pipeline.
    EnsureTable,
}

impl Materialization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Materialization::View => "view",
            Materialization::Table => "table",
            Materialization::EnsureTable => "ensure_table",
        }
    }
}

/// The push hook carried by a staging view. It MUST run only after the
/// owning view has been (re)created, because the merge reads the view;
/// the orchestrator owns that invocation order.
#[derive(Clone, Debug, PartialEq)]
pub struct PostHook {
    pub target: String,
    pub source: String,
    pub match_predicate: String,
    pub insert_columns: Vec<String>,
}

/// One node of the compiled model graph: the statements which materialize
/// a relation, its dependencies by relation name, and an optional push
/// hook.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    /// Stable node identity, e.g. `model.tyrell_corp.stg_tyrell_corp__shopify_orders`.
    pub node_id: String,
    /// The relation this model materializes; also its graph name.
    pub name: String,
    pub layer: Layer,
    pub materialization: Materialization,
    /// Rendered statements, in execution order.
    pub statements: Vec<String>,
    /// Relation names this model reads. Names with no corresponding node
    /// (landed tables) are external inputs, not edges.
    pub depends_on: Vec<String>,
    pub post_hook: Option<PostHook>,
    pub tags: Vec<String>,
}

impl ModelSpec {
    /// Artifact file body: statements joined and terminated.
    pub fn artifact_sql(&self) -> String {
        let mut out = self.statements.join(";\n\n");
        out.push_str(";\n");
        out
    }
}

/// The landed (raw) relation for one tenant, source, and object.
pub fn landed_relation(
    tenant: &TenantSlug,
    source: &SourcePlatform,
    object: &ObjectName,
) -> Relation {
    Relation::namespaced(tenant.as_str(), format!("{source}_{object}"))
}

pub fn source_shim_name(tenant: &TenantSlug, source: &SourcePlatform, object: &ObjectName) -> String {
    format!("src_{tenant}__{source}_{object}")
}

pub fn staging_name(tenant: &TenantSlug, source: &SourcePlatform, object: &ObjectName) -> String {
    format!("stg_{tenant}__{source}_{object}")
}

pub fn intermediate_name(
    tenant: &TenantSlug,
    source: &SourcePlatform,
    object: &ObjectName,
) -> String {
    format!("int_{tenant}__{source}_{object}")
}

pub fn star_name(kind: TableKind, tenant: &TenantSlug, domain: Domain) -> String {
    format!("{}_{tenant}__{domain}", kind.prefix())
}
