use models::{
    intermediate_name, Layer, Materialization, ModelSpec, ObjectName, SourcePlatform, TenantSlug,
    LOADED_AT, RAW_DATA_PAYLOAD,
};
use sqlgen::{ColumnDef, Expr, Query, Relation, Select, SqlType, Statement};
use std::collections::BTreeMap;

/// One extraction of the intermediate unpacker: a payload key, its alias,
/// and its cast target. `keep_as_json` preserves nested objects untouched;
/// `expression` overrides the extraction entirely (computed columns).
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractColumn {
    pub json_key: String,
    pub alias: String,
    pub cast_to: SqlType,
    pub keep_as_json: bool,
    pub expression: Option<String>,
}

impl ExtractColumn {
    pub fn typed(json_key: impl Into<String>, cast_to: SqlType) -> Self {
        let json_key = json_key.into();
        Self {
            alias: json_key.clone(),
            json_key,
            cast_to,
            keep_as_json: false,
            expression: None,
        }
    }

    pub fn json(json_key: impl Into<String>) -> Self {
        let json_key = json_key.into();
        Self {
            alias: json_key.clone(),
            json_key,
            cast_to: SqlType::Json,
            keep_as_json: true,
            expression: None,
        }
    }

    fn expr(&self) -> Expr {
        if let Some(expression) = &self.expression {
            return Expr::raw(expression.clone());
        }
        let extract = Expr::json_extract(Expr::col(RAW_DATA_PAYLOAD), format!("$.{}", self.json_key));
        match self.cast_to {
            _ if self.keep_as_json => extract,
            // Temporal values ride as ISO-8601 text; a numeric-affinity
            // CAST would truncate them to their leading digits.
            SqlType::Date | SqlType::Timestamp => extract,
            ty => Expr::cast(extract, ty),
        }
    }
}

fn scalar_type_of(token: &str) -> SqlType {
    match token {
        "bigint" => SqlType::BigInt,
        "integer" => SqlType::Integer,
        "double" => SqlType::Double,
        "boolean" => SqlType::Boolean,
        "date" => SqlType::Date,
        "timestamp" => SqlType::Timestamp,
        "json" => SqlType::Json,
        _ => SqlType::Varchar,
    }
}

/// Derive the full extraction spec from a blueprint's canonical schema
/// (column name to normalized type), in lexicographic column order.
pub fn extraction_spec_from_schema(schema: &BTreeMap<String, String>) -> Vec<ExtractColumn> {
    schema
        .iter()
        .map(|(name, token)| match token.as_str() {
            "json" => ExtractColumn::json(name.clone()),
            _ => ExtractColumn::typed(name.clone(), scalar_type_of(token)),
        })
        .collect()
}

/// Generate the intermediate unpacker model: a table-materialized SELECT
/// over the master sink, filtered to one tenant and source, with typed
/// columns extracted from the payload. This is the sole locus of
/// JSON-to-typed extraction; engines consume only typed rows.
pub fn intermediate_model(
    tenant: &TenantSlug,
    source: &SourcePlatform,
    object: &ObjectName,
    master_model_id: &str,
    spec: &[ExtractColumn],
) -> ModelSpec {
    let name = intermediate_name(tenant, source, object);
    let relation = Relation::new(&name);

    let mut columns = vec![
        ColumnDef::new("tenant_slug", SqlType::Varchar),
        ColumnDef::new("source_platform", SqlType::Varchar),
        ColumnDef::new("tenant_skey", SqlType::Varchar),
        ColumnDef::new(LOADED_AT, SqlType::Timestamp),
    ];
    let mut select = Select::new()
        .column(Expr::col("tenant_slug"), "tenant_slug")
        .column(Expr::col("source_platform"), "source_platform")
        .column(Expr::col("tenant_skey"), "tenant_skey")
        .column(Expr::col(LOADED_AT), LOADED_AT);

    for extract in spec {
        columns.push(ColumnDef::new(&extract.alias, extract.cast_to));
        select = select.column(extract.expr(), &extract.alias);
    }

    // The raw payload rides along, last.
    columns.push(ColumnDef::new(RAW_DATA_PAYLOAD, SqlType::Json));
    select = select
        .column(Expr::col(RAW_DATA_PAYLOAD), RAW_DATA_PAYLOAD)
        .from_relation(Relation::new(master_model_id), "sink")
        .filter(Expr::eq(
            Expr::col("tenant_slug"),
            Expr::text(tenant.as_str()),
        ))
        .filter(Expr::eq(
            Expr::col("source_platform"),
            Expr::text(source.as_str()),
        ));

    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    ModelSpec {
        node_id: format!("model.{tenant}.{name}"),
        name: name.clone(),
        layer: Layer::Intermediate,
        materialization: Materialization::Table,
        statements: vec![
            Statement::DropTableIfExists {
                relation: relation.clone(),
            }
            .render(),
            Statement::CreateTable {
                relation: relation.clone(),
                columns,
                if_not_exists: false,
            }
            .render(),
            Statement::InsertSelect {
                target: relation,
                columns: column_names,
                query: Query::Select(select),
            }
            .render(),
        ],
        // Logic-free master sinks are the only upstream edge; the push
        // hook's timing is what pass B exists to absorb.
        depends_on: vec![master_model_id.to_string()],
        post_hook: None,
        tags: vec!["intermediate".to_string()],
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn schema() -> BTreeMap<String, String> {
        [
            ("id", "bigint"),
            ("created_at", "timestamp"),
            ("total_price", "double"),
            ("line_items", "json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn derives_specs_in_lexicographic_order() {
        let spec = extraction_spec_from_schema(&schema());
        let aliases: Vec<&str> = spec.iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(aliases, vec!["created_at", "id", "line_items", "total_price"]);
        assert!(spec[2].keep_as_json);
    }

    #[test]
    fn unpacker_extracts_filters_and_rides_the_payload_last() {
        let model = intermediate_model(
            &TenantSlug::new("tyrell_corp"),
            &SourcePlatform::new("shopify"),
            &ObjectName::new("orders"),
            "shopify_v1_orders",
            &extraction_spec_from_schema(&schema()),
        );

        assert_eq!(model.name, "int_tyrell_corp__shopify_orders");
        assert_eq!(model.depends_on, vec!["shopify_v1_orders"]);

        let insert = &model.statements[2];
        insta::assert_snapshot!(insert, @r###"
        INSERT INTO "int_tyrell_corp__shopify_orders" ("tenant_slug", "source_platform", "tenant_skey", "loaded_at", "created_at", "id", "line_items", "total_price", "raw_data_payload")
        SELECT
            "tenant_slug" AS "tenant_slug",
            "source_platform" AS "source_platform",
            "tenant_skey" AS "tenant_skey",
            "loaded_at" AS "loaded_at",
            json_extract("raw_data_payload", '$.created_at') AS "created_at",
            CAST(json_extract("raw_data_payload", '$.id') AS BIGINT) AS "id",
            json_extract("raw_data_payload", '$.line_items') AS "line_items",
            CAST(json_extract("raw_data_payload", '$.total_price') AS DOUBLE) AS "total_price",
            "raw_data_payload" AS "raw_data_payload"
        FROM "shopify_v1_orders" AS "sink"
        WHERE "tenant_slug" = 'tyrell_corp' AND "source_platform" = 'shopify'
        "###);
    }

    #[test]
    fn expression_overrides_replace_the_extraction() {
        let mut extract = ExtractColumn::typed("cost_micros", SqlType::Double);
        extract.alias = "spend".to_string();
        extract.expression = Some(
            "CAST(json_extract(\"raw_data_payload\", '$.cost_micros') AS DOUBLE) / 1000000.0"
                .to_string(),
        );
        assert!(extract.expr().render().ends_with("/ 1000000.0"));
    }
}
