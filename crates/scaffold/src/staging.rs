use super::Error;
use models::{
    landed_relation, master_contract, source_shim_name, staging_name, Layer, Materialization,
    ModelSpec, ObjectName, PostHook, SourcePlatform, TenantSlug, CONTRACT_COLUMNS,
};
use sqlgen::{Expr, Query, Relation, Select, Statement};
use std::collections::BTreeMap;
use warehouse::Warehouse;

/// The scaffolder's product for one landed table.
#[derive(Clone, Debug)]
pub struct ScaffoldOutput {
    pub master_model_id: String,
    pub source_schema_hash: String,
    /// The routed blueprint's column-name to normalized-type map, which
    /// seeds the intermediate unpacker's extraction spec.
    pub canonical_schema: BTreeMap<String, String>,
    /// Master ensure, source shim, staging view, in that order.
    pub models: Vec<ModelSpec>,
}

/// Scaffold one landed table: describe it, fingerprint it, route it
/// through the blueprint registry, and emit its generated models.
///
/// An unrecognized fingerprint fails with `UnknownSchema` before any
/// model is emitted; nothing is created or dropped.
#[tracing::instrument(skip(wh), fields(tenant = %tenant, source = %source, object = %object))]
pub async fn scaffold_landed_table(
    wh: &dyn Warehouse,
    tenant: &TenantSlug,
    source: &SourcePlatform,
    object: &ObjectName,
) -> Result<ScaffoldOutput, Error> {
    let landed = landed_relation(tenant, source, object);
    let observed = wh.describe(&landed.ident()).await?;

    let print = catalog::fingerprint(
        observed
            .iter()
            .map(|(name, ty)| (name.as_str(), ty.as_str())),
    );

    let blueprint = match catalog::lookup(wh, &print).await? {
        Some(blueprint) => blueprint,
        None => {
            let known = catalog::load_all(wh).await.unwrap_or_default();
            let closest = catalog::closest_blueprint(&known, &observed);
            return Err(Error::UnknownSchema {
                tenant: tenant.to_string(),
                table: landed.ident(),
                observed,
                closest,
            });
        }
    };
    let master_model_id = blueprint.master_model_id.clone();
    tracing::debug!(%master_model_id, fingerprint = %print, "routed landed table");

    // Columns carried into the payload: everything the ingestor landed,
    // minus its own bookkeeping.
    let payload_columns: Vec<&str> = observed
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| !catalog::is_etl_column(name))
        .collect();

    let schema_map: BTreeMap<String, String> = observed
        .iter()
        .filter(|(name, _)| !catalog::is_etl_column(name))
        .map(|(name, ty)| (name.clone(), catalog::normalize_type(ty)))
        .collect();
    let schema_json = serde_json::to_string(&schema_map).unwrap_or_default();

    let master = master_model(&master_model_id);
    let shim = source_shim_model(tenant, source, object, &landed);
    let staging = staging_model(
        tenant,
        source,
        object,
        &master_model_id,
        &print,
        &schema_json,
        &payload_columns,
    );

    Ok(ScaffoldOutput {
        master_model_id,
        source_schema_hash: print,
        canonical_schema: blueprint.canonical_schema,
        models: vec![master, shim, staging],
    })
}

/// The idempotent master-sink shell. Never dropped, never recreated
/// destructively; hydrated only by push hooks.
pub fn master_model(master_model_id: &str) -> ModelSpec {
    let create = Statement::CreateTable {
        relation: Relation::new(master_model_id),
        columns: master_contract(),
        if_not_exists: true,
    };
    ModelSpec {
        node_id: format!("model.platform.{master_model_id}"),
        name: master_model_id.to_string(),
        layer: Layer::MasterSink,
        materialization: Materialization::EnsureTable,
        statements: vec![create.render()],
        depends_on: Vec::new(),
        post_hook: None,
        tags: vec!["master".to_string()],
    }
}

fn source_shim_model(
    tenant: &TenantSlug,
    source: &SourcePlatform,
    object: &ObjectName,
    landed: &Relation,
) -> ModelSpec {
    let name = source_shim_name(tenant, source, object);
    let relation = Relation::new(&name);
    let select = Select::new()
        .column_bare(Expr::raw("*"))
        .from_relation(landed.clone(), "landed");

    ModelSpec {
        node_id: format!("model.{tenant}.{name}"),
        name: name.clone(),
        layer: Layer::Source,
        materialization: Materialization::View,
        statements: vec![
            Statement::DropViewIfExists {
                relation: relation.clone(),
            }
            .render(),
            Statement::CreateView {
                relation,
                query: Query::Select(select),
            }
            .render(),
        ],
        depends_on: Vec::new(),
        post_hook: None,
        tags: vec!["source".to_string()],
    }
}

fn staging_model(
    tenant: &TenantSlug,
    source: &SourcePlatform,
    object: &ObjectName,
    master_model_id: &str,
    schema_hash: &str,
    schema_json: &str,
    payload_columns: &[&str],
) -> ModelSpec {
    let name = staging_name(tenant, source, object);
    let shim = source_shim_name(tenant, source, object);
    let relation = Relation::new(&name);

    // json_object('a', "a", 'b', "b", ...): the full original record.
    let payload_args: Vec<Expr> = payload_columns
        .iter()
        .flat_map(|column| [Expr::text(*column), Expr::col(*column)])
        .collect();

    let select = Select::new()
        .column(Expr::text(tenant.as_str()), "tenant_slug")
        .column(
            Expr::text(catalog::fingerprint_tenant(tenant.as_str())),
            "tenant_skey",
        )
        .column(Expr::text(source.as_str()), "source_platform")
        .column(Expr::text(schema_hash), "source_schema_hash")
        .column(Expr::text(schema_json), "source_schema")
        .column(Expr::func("json_object", payload_args), "raw_data_payload")
        // Wall clock at hook execution, not at ingest.
        .column(
            Expr::raw("strftime('%Y-%m-%dT%H:%M:%fZ', 'now')"),
            "loaded_at",
        )
        .from_relation(Relation::new(&shim), "src");

    ModelSpec {
        node_id: format!("model.{tenant}.{name}"),
        name: name.clone(),
        layer: Layer::Staging,
        materialization: Materialization::View,
        statements: vec![
            Statement::DropViewIfExists {
                relation: relation.clone(),
            }
            .render(),
            Statement::CreateView {
                relation,
                query: Query::Select(select),
            }
            .render(),
        ],
        depends_on: vec![shim],
        post_hook: Some(push_hook(master_model_id, &name)),
        tags: vec!["staging".to_string()],
    }
}

/// The push hook: merge staged rows into the master sink, keyed by
/// `(tenant_slug, source_platform, payload content hash)`, insert-only.
fn push_hook(master_model_id: &str, staging: &str) -> PostHook {
    let key = Expr::and(
        Expr::and(
            Expr::eq(
                Expr::qual("t", "tenant_slug"),
                Expr::qual("s", "tenant_slug"),
            ),
            Expr::eq(
                Expr::qual("t", "source_platform"),
                Expr::qual("s", "source_platform"),
            ),
        ),
        Expr::eq(
            Expr::func("md5", vec![Expr::qual("t", "raw_data_payload")]),
            Expr::func("md5", vec![Expr::qual("s", "raw_data_payload")]),
        ),
    );

    PostHook {
        target: master_model_id.to_string(),
        source: staging.to_string(),
        match_predicate: key.render(),
        insert_columns: CONTRACT_COLUMNS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use warehouse::SqliteWarehouse;

    async fn landed_fixture(wh: &SqliteWarehouse) {
        wh.execute(
            "CREATE TABLE tyrell_corp__shopify_orders (\n\
             id BIGINT, created_at TIMESTAMP, total_price DOUBLE, currency VARCHAR,\n\
             financial_status VARCHAR, email VARCHAR, customer_id BIGINT, line_items JSON,\n\
             _dlt_load_id VARCHAR, _dlt_id VARCHAR)",
        )
        .await
        .unwrap();
    }

    fn keys() -> (TenantSlug, SourcePlatform, ObjectName) {
        (
            TenantSlug::new("tyrell_corp"),
            SourcePlatform::new("shopify"),
            ObjectName::new("orders"),
        )
    }

    #[tokio::test]
    async fn scaffolds_a_recognized_landed_table() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        catalog::initialize(&wh, &catalog::list_supported()).await.unwrap();
        landed_fixture(&wh).await;
        let (tenant, source, object) = keys();

        let output = scaffold_landed_table(&wh, &tenant, &source, &object)
            .await
            .unwrap();
        assert_eq!(output.master_model_id, "shopify_v1_orders");
        assert_eq!(output.models.len(), 3);

        let staging = &output.models[2];
        assert_eq!(staging.name, "stg_tyrell_corp__shopify_orders");
        assert_eq!(staging.depends_on, vec!["src_tyrell_corp__shopify_orders"]);

        let hook = staging.post_hook.as_ref().unwrap();
        assert_eq!(hook.target, "shopify_v1_orders");
        assert_eq!(hook.insert_columns.len(), 7);
        assert!(hook.match_predicate.contains("md5"));
    }

    #[tokio::test]
    async fn staging_view_projects_the_seven_column_contract() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        catalog::initialize(&wh, &catalog::list_supported()).await.unwrap();
        landed_fixture(&wh).await;
        let (tenant, source, object) = keys();

        let output = scaffold_landed_table(&wh, &tenant, &source, &object)
            .await
            .unwrap();

        // Execute the generated models, then inspect the staging view.
        for model in &output.models {
            for stmt in &model.statements {
                wh.execute(stmt).await.unwrap();
            }
        }
        let columns = wh
            .describe("stg_tyrell_corp__shopify_orders")
            .await
            .unwrap();
        let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "tenant_slug",
                "tenant_skey",
                "source_platform",
                "source_schema_hash",
                "source_schema",
                "raw_data_payload",
                "loaded_at",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_schemas_fail_with_closest_blueprint() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        catalog::initialize(&wh, &catalog::list_supported()).await.unwrap();
        wh.execute(
            "CREATE TABLE tyrell_corp__shopify_orders (\n\
             id BIGINT, created_at TIMESTAMP, total_price DOUBLE, currency VARCHAR,\n\
             financial_status VARCHAR, email VARCHAR, customer_id BIGINT, line_items JSON,\n\
             surprise VARCHAR)",
        )
        .await
        .unwrap();
        let (tenant, source, object) = keys();

        match scaffold_landed_table(&wh, &tenant, &source, &object).await {
            Err(Error::UnknownSchema { closest, .. }) => {
                let closest = closest.unwrap();
                assert_eq!(closest.master_model_id, "shopify_v1_orders");
                assert_eq!(closest.differing_columns, vec!["surprise"]);
            }
            other => panic!("expected UnknownSchema, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scaffolding_is_deterministic() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        catalog::initialize(&wh, &catalog::list_supported()).await.unwrap();
        landed_fixture(&wh).await;
        let (tenant, source, object) = keys();

        let first = scaffold_landed_table(&wh, &tenant, &source, &object)
            .await
            .unwrap();
        let second = scaffold_landed_table(&wh, &tenant, &source, &object)
            .await
            .unwrap();

        for (a, b) in first.models.iter().zip(second.models.iter()) {
            assert_eq!(a.artifact_sql(), b.artifact_sql());
        }
    }
}
