use itertools::Itertools;
use models::{ModelSpec, RunResult, RunStatus};
use sqlgen::quote_text;
use uuid::Uuid;
use warehouse::Warehouse;

pub const MODEL_ARTIFACTS: &str = "model_artifacts";
pub const RUN_RESULTS: &str = "run_results";
pub const TEST_ARTIFACTS: &str = "test_artifacts";

/// Bounded insert batch, respecting engine parameter limits.
const BATCH_ROWS: usize = 25;

/// One data-quality check attached to a materialized relation. The check
/// query returns a single count of violating rows; zero passes.
#[derive(Clone, Debug)]
pub struct DataTest {
    pub node_id: String,
    pub test_name: String,
    pub check_sql: String,
}

/// The evaluated result of one data test.
#[derive(Clone, Debug)]
pub struct TestOutcome {
    pub node_id: String,
    pub test_name: String,
    pub status: RunStatus,
    pub message: Option<String>,
}

/// Evaluate data tests against the warehouse. A check that itself errors
/// is a failure carrying the engine's message, not a crash.
pub async fn run_data_tests(wh: &dyn Warehouse, tests: &[DataTest]) -> Vec<TestOutcome> {
    let mut outcomes = Vec::with_capacity(tests.len());
    for test in tests {
        let (status, message) = match wh.query(&test.check_sql).await {
            Ok(rows) => {
                let violations = rows
                    .first()
                    .and_then(|row| row.first())
                    .and_then(|value| value.as_i64())
                    .unwrap_or_default();
                if violations == 0 {
                    (RunStatus::Success, None)
                } else {
                    (
                        RunStatus::Failed,
                        Some(format!("{violations} rows violated {}", test.test_name)),
                    )
                }
            }
            Err(err) => (RunStatus::Failed, Some(format!("{err:#}"))),
        };
        if status != RunStatus::Success {
            tracing::warn!(node = %test.node_id, test = %test.test_name, ?message, "data test failed");
        }
        outcomes.push(TestOutcome {
            node_id: test.node_id.clone(),
            test_name: test.test_name.clone(),
            status,
            message,
        });
    }
    outcomes
}

fn nullable(value: Option<String>) -> String {
    match value {
        Some(value) => quote_text(&value),
        None => "NULL".to_string(),
    }
}

async fn ensure_tables(wh: &dyn Warehouse) -> Result<(), warehouse::Error> {
    wh.execute(&format!(
        "CREATE TABLE IF NOT EXISTS \"{MODEL_ARTIFACTS}\" (\n\
         \x20   \"invocation_id\" VARCHAR,\n\
         \x20   \"node_id\" VARCHAR,\n\
         \x20   \"name\" VARCHAR,\n\
         \x20   \"materialization\" VARCHAR,\n\
         \x20   \"tags\" JSON,\n\
         \x20   \"depends_on\" JSON,\n\
         \x20   \"last_status\" VARCHAR,\n\
         \x20   \"message\" VARCHAR,\n\
         \x20   \"rows_affected\" BIGINT,\n\
         \x20   \"execution_time_seconds\" DOUBLE,\n\
         \x20   \"started_at\" TIMESTAMP,\n\
         \x20   \"completed_at\" TIMESTAMP\n\
         )"
    ))
    .await?;
    wh.execute(&format!(
        "CREATE TABLE IF NOT EXISTS \"{RUN_RESULTS}\" (\n\
         \x20   \"invocation_id\" VARCHAR,\n\
         \x20   \"node_id\" VARCHAR,\n\
         \x20   \"status\" VARCHAR,\n\
         \x20   \"message\" VARCHAR,\n\
         \x20   \"rows_affected\" BIGINT,\n\
         \x20   \"execution_time_seconds\" DOUBLE,\n\
         \x20   \"started_at\" TIMESTAMP,\n\
         \x20   \"completed_at\" TIMESTAMP\n\
         )"
    ))
    .await?;
    wh.execute(&format!(
        "CREATE TABLE IF NOT EXISTS \"{TEST_ARTIFACTS}\" (\n\
         \x20   \"invocation_id\" VARCHAR,\n\
         \x20   \"node_id\" VARCHAR,\n\
         \x20   \"test_name\" VARCHAR,\n\
         \x20   \"status\" VARCHAR,\n\
         \x20   \"message\" VARCHAR\n\
         )"
    ))
    .await?;
    Ok(())
}

async fn insert_batched(
    wh: &dyn Warehouse,
    table: &str,
    rows: Vec<String>,
) -> Result<(), warehouse::Error> {
    for chunk in rows.chunks(BATCH_ROWS) {
        wh.execute(&format!(
            "INSERT INTO \"{table}\" VALUES\n{}",
            chunk.iter().join(",\n")
        ))
        .await?;
    }
    Ok(())
}

/// Record one invocation's artifacts: the model catalog and data-test
/// rows are truncate-and-insert (they describe the latest run), while run
/// results append across invocations.
#[tracing::instrument(skip_all, fields(%invocation_id, models = models.len(), results = results.len(), tests = tests.len()))]
pub async fn record_run(
    wh: &dyn Warehouse,
    invocation_id: Uuid,
    models: &[ModelSpec],
    results: &[RunResult],
    tests: &[TestOutcome],
) -> Result<(), warehouse::Error> {
    ensure_tables(wh).await?;

    let by_node: std::collections::BTreeMap<&str, &RunResult> = results
        .iter()
        .map(|result| (result.node_id.as_str(), result))
        .collect();

    let model_rows: Vec<String> = models
        .iter()
        .map(|model| {
            let result = by_node.get(model.node_id.as_str());
            format!(
                "({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
                quote_text(&invocation_id.to_string()),
                quote_text(&model.node_id),
                quote_text(&model.name),
                quote_text(model.materialization.as_str()),
                quote_text(&serde_json::to_string(&model.tags).unwrap_or_default()),
                quote_text(&serde_json::to_string(&model.depends_on).unwrap_or_default()),
                nullable(result.map(|r| r.status.as_str().to_string())),
                nullable(result.and_then(|r| r.message.clone())),
                result
                    .and_then(|r| r.rows_affected)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "NULL".to_string()),
                result
                    .map(|r| r.execution_time_seconds.to_string())
                    .unwrap_or_else(|| "NULL".to_string()),
                nullable(result.map(|r| r.started_at.to_rfc3339())),
                nullable(result.map(|r| r.completed_at.to_rfc3339())),
            )
        })
        .collect();

    let result_rows: Vec<String> = results
        .iter()
        .map(|result| {
            format!(
                "({}, {}, {}, {}, {}, {}, {}, {})",
                quote_text(&result.invocation_id.to_string()),
                quote_text(&result.node_id),
                quote_text(result.status.as_str()),
                nullable(result.message.clone()),
                result
                    .rows_affected
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "NULL".to_string()),
                result.execution_time_seconds,
                quote_text(&result.started_at.to_rfc3339()),
                quote_text(&result.completed_at.to_rfc3339()),
            )
        })
        .collect();

    let test_rows: Vec<String> = tests
        .iter()
        .map(|outcome| {
            format!(
                "({}, {}, {}, {}, {})",
                quote_text(&invocation_id.to_string()),
                quote_text(&outcome.node_id),
                quote_text(&outcome.test_name),
                quote_text(outcome.status.as_str()),
                nullable(outcome.message.clone()),
            )
        })
        .collect();

    wh.execute(&format!("DELETE FROM \"{MODEL_ARTIFACTS}\"")).await?;
    wh.execute(&format!("DELETE FROM \"{TEST_ARTIFACTS}\"")).await?;
    insert_batched(wh, MODEL_ARTIFACTS, model_rows).await?;
    insert_batched(wh, TEST_ARTIFACTS, test_rows).await?;
    insert_batched(wh, RUN_RESULTS, result_rows).await?;
    Ok(())
}
