use super::{fingerprint, normalize_type, ConnectorEntry};
use itertools::Itertools;
use models::{ObjectName, SourcePlatform};
use sqlgen::{quote_text, ColumnDef, Relation, SqlType, Statement};
use std::collections::{BTreeMap, BTreeSet};
use warehouse::Warehouse;

/// The registry's backing table.
pub const BLUEPRINT_TABLE: &str = "connector_blueprints";
const STAGED_TABLE: &str = "connector_blueprints_staged";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "blueprint collision: {first} and {second} share fingerprint {fingerprint}; \
         registry initialization aborted"
    )]
    Collision {
        fingerprint: String,
        first: String,
        second: String,
    },
    #[error(transparent)]
    Warehouse(#[from] warehouse::Error),
    #[error("malformed blueprint row for {master_model_id}")]
    MalformedRow { master_model_id: String },
}

/// One persisted blueprint: a recognized source-object contract and the
/// master model it routes to.
#[derive(Clone, Debug, PartialEq)]
pub struct BlueprintRow {
    pub master_model_id: String,
    pub source_platform: SourcePlatform,
    pub api_version: String,
    pub object: ObjectName,
    pub fingerprint: String,
    /// Column-name to declared-type map.
    pub canonical_schema: BTreeMap<String, String>,
}

/// The nearest known blueprint to an unrecognized column set, by smallest
/// symmetric difference over column names. Surfaced to the operator when
/// routing fails.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosestBlueprint {
    pub master_model_id: String,
    /// Columns present on exactly one side, sorted.
    pub differing_columns: Vec<String>,
}

fn table_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("master_model_id", SqlType::Varchar),
        ColumnDef::new("source_platform", SqlType::Varchar),
        ColumnDef::new("api_version", SqlType::Varchar),
        ColumnDef::new("object", SqlType::Varchar),
        ColumnDef::new("fingerprint", SqlType::Varchar),
        ColumnDef::new("canonical_schema", SqlType::Json),
    ]
}

/// Build the registry from a catalog release and swap it in atomically.
///
/// Rows are validated in full before any statement is issued: a duplicate
/// fingerprint across distinct master model ids aborts with `Collision`
/// and leaves no partial registry state. Re-running with the same catalog
/// is a no-op (the same rows are swapped in again).
pub async fn initialize(wh: &dyn Warehouse, entries: &[ConnectorEntry]) -> Result<usize, Error> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let mut rows = Vec::with_capacity(entries.len());

    for entry in entries {
        let print = fingerprint(entry.columns.iter().copied());
        let id = entry.master_model_id();

        if let Some(first) = seen.get(&print) {
            return Err(Error::Collision {
                fingerprint: print,
                first: first.clone(),
                second: id,
            });
        }
        seen.insert(print.clone(), id.clone());

        let schema: BTreeMap<&str, String> = entry
            .columns
            .iter()
            .map(|(name, ty)| (*name, normalize_type(ty)))
            .collect();
        let schema_json =
            serde_json::to_string(&schema).map_err(|_| Error::MalformedRow {
                master_model_id: id.clone(),
            })?;

        rows.push(format!(
            "({}, {}, {}, {}, {}, {})",
            quote_text(&id),
            quote_text(entry.source_platform.as_str()),
            quote_text(entry.api_version),
            quote_text(entry.object.as_str()),
            quote_text(&print),
            quote_text(&schema_json),
        ));
    }

    let create = Statement::CreateTable {
        relation: Relation::new(BLUEPRINT_TABLE),
        columns: table_columns(),
        if_not_exists: true,
    };
    let create_staged = Statement::CreateTable {
        relation: Relation::new(STAGED_TABLE),
        columns: table_columns(),
        if_not_exists: false,
    };
    let insert_staged = format!(
        "INSERT INTO \"{STAGED_TABLE}\" VALUES\n{}",
        rows.iter().join(",\n")
    );

    // Stage, then swap under one transaction.
    wh.transactional(&[
        create.render(),
        format!("DROP TABLE IF EXISTS \"{STAGED_TABLE}\""),
        create_staged.render(),
        insert_staged,
        format!("DELETE FROM \"{BLUEPRINT_TABLE}\""),
        format!("INSERT INTO \"{BLUEPRINT_TABLE}\" SELECT * FROM \"{STAGED_TABLE}\""),
        format!("DROP TABLE \"{STAGED_TABLE}\""),
    ])
    .await?;

    tracing::info!(rows = rows.len(), "initialized connector blueprint registry");
    Ok(rows.len())
}

fn scan_row(row: &[warehouse::Value]) -> Option<BlueprintRow> {
    let text = |index: usize| row.get(index)?.as_str().map(str::to_string);
    let schema: BTreeMap<String, String> = serde_json::from_str(&text(5)?).ok()?;
    Some(BlueprintRow {
        master_model_id: text(0)?,
        source_platform: SourcePlatform::new(text(1)?),
        api_version: text(2)?,
        object: ObjectName::new(text(3)?),
        fingerprint: text(4)?,
        canonical_schema: schema,
    })
}

const SELECT_COLUMNS: &str =
    "master_model_id, source_platform, api_version, object, fingerprint, canonical_schema";

/// Look up the blueprint registered for a fingerprint, if any.
pub async fn lookup(wh: &dyn Warehouse, print: &str) -> Result<Option<BlueprintRow>, Error> {
    let rows = wh
        .query(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"{BLUEPRINT_TABLE}\" WHERE fingerprint = {}",
            quote_text(print)
        ))
        .await?;

    match rows.first() {
        None => Ok(None),
        Some(row) => Ok(Some(scan_row(row).ok_or(Error::MalformedRow {
            master_model_id: "<unscannable>".to_string(),
        })?)),
    }
}

/// All registered blueprints, ordered by master model id.
pub async fn load_all(wh: &dyn Warehouse) -> Result<Vec<BlueprintRow>, Error> {
    let rows = wh
        .query(&format!(
            "SELECT {SELECT_COLUMNS} FROM \"{BLUEPRINT_TABLE}\" ORDER BY master_model_id"
        ))
        .await?;

    rows.iter()
        .map(|row| {
            scan_row(row).ok_or(Error::MalformedRow {
                master_model_id: "<unscannable>".to_string(),
            })
        })
        .collect()
}

/// The registered blueprint nearest to an observed column set, by smallest
/// symmetric difference over column names.
pub fn closest_blueprint(
    blueprints: &[BlueprintRow],
    observed: &[(String, String)],
) -> Option<ClosestBlueprint> {
    let observed: BTreeSet<&str> = observed
        .iter()
        .filter(|(name, _)| !super::is_etl_column(name))
        .map(|(name, _)| name.as_str())
        .collect();

    blueprints
        .iter()
        .map(|row| {
            let known: BTreeSet<&str> =
                row.canonical_schema.keys().map(String::as_str).collect();
            let differing: Vec<String> = known
                .symmetric_difference(&observed)
                .map(|name| name.to_string())
                .sorted()
                .collect();
            (differing.len(), row.master_model_id.clone(), differing)
        })
        .min()
        .map(|(_, master_model_id, differing_columns)| ClosestBlueprint {
            master_model_id,
            differing_columns,
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::list_supported;
    use warehouse::SqliteWarehouse;

    #[tokio::test]
    async fn initialize_registers_every_connector_once() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        let entries = list_supported();

        let count = initialize(&wh, &entries).await.unwrap();
        assert_eq!(count, 32);

        let all = load_all(&wh).await.unwrap();
        assert_eq!(all.len(), 32);

        // Repeating initialization is a no-op.
        let count = initialize(&wh, &entries).await.unwrap();
        assert_eq!(count, 32);
        assert_eq!(load_all(&wh).await.unwrap(), all);
    }

    #[tokio::test]
    async fn lookup_routes_by_fingerprint() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        let entries = list_supported();
        initialize(&wh, &entries).await.unwrap();

        let shopify = entries
            .iter()
            .find(|e| e.master_model_id() == "shopify_v1_orders")
            .unwrap();
        let print = fingerprint(shopify.columns.iter().copied());

        let row = lookup(&wh, &print).await.unwrap().unwrap();
        assert_eq!(row.master_model_id, "shopify_v1_orders");
        assert_eq!(row.api_version, "v1");

        assert_eq!(lookup(&wh, "not-a-fingerprint").await.unwrap(), None);
    }

    #[tokio::test]
    async fn collisions_abort_without_partial_state() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        let mut entries = list_supported();

        // Forge a second entry with an identical column set.
        let mut forged = entries[0].clone();
        forged.object = ObjectName::new("orders_copy");
        entries.push(forged);

        match initialize(&wh, &entries).await {
            Err(Error::Collision { first, second, .. }) => {
                assert_eq!(first, "bigcommerce_v3_orders");
                assert_eq!(second, "bigcommerce_v3_orders_copy");
            }
            other => panic!("expected Collision, got {other:?}"),
        }

        // Nothing was written.
        assert!(wh.describe(BLUEPRINT_TABLE).await.is_err());
    }

    #[tokio::test]
    async fn closest_blueprint_minimizes_symmetric_difference() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        let entries = list_supported();
        initialize(&wh, &entries).await.unwrap();
        let all = load_all(&wh).await.unwrap();

        // Shopify orders with one unexpected column.
        let observed: Vec<(String, String)> = entries
            .iter()
            .find(|e| e.master_model_id() == "shopify_v1_orders")
            .unwrap()
            .columns
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.to_string()))
            .chain([("surprise".to_string(), "VARCHAR".to_string())])
            .collect();

        let closest = closest_blueprint(&all, &observed).unwrap();
        assert_eq!(closest.master_model_id, "shopify_v1_orders");
        assert_eq!(closest.differing_columns, vec!["surprise"]);
    }
}
