use super::graph::ModelGraph;
use chrono::Utc;
use models::{ModelSpec, RunResult, RunStatus};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warehouse::Warehouse;

#[derive(Clone, Debug)]
pub struct ExecOptions {
    /// Maximum concurrently-running models.
    pub fan_out: usize,
    /// Deadline per warehouse statement; expiry aborts best-effort and
    /// marks the model `TimedOut`.
    pub statement_timeout: Duration,
    /// Stop scheduling new models after the first failure.
    pub fail_fast: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            fan_out: 4,
            statement_timeout: Duration::from_secs(60),
            fail_fast: false,
        }
    }
}

#[derive(Debug)]
pub struct PassReport {
    /// One result per executed node, in node order.
    pub results: Vec<RunResult>,
    pub cancelled: bool,
}

impl PassReport {
    pub fn all_successful(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.status, RunStatus::Success))
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !matches!(r.status, RunStatus::Success | RunStatus::Skipped))
            .count()
    }
}

/// Execute one materialization pass over `graph`, restricted to `subset`
/// when given, in dependency order with bounded fan-out.
///
/// A failed model skips its dependents but leaves independent subtrees
/// running (unless `fail_fast`). Cancellation stops scheduling, lets
/// in-flight models finish or time out, and marks unstarted models
/// `Cancelled`.
pub async fn execute_pass(
    wh: Arc<dyn Warehouse>,
    graph: &ModelGraph,
    subset: Option<&BTreeSet<usize>>,
    opts: &ExecOptions,
    cancel: &CancellationToken,
    invocation_id: Uuid,
    pass: &str,
) -> PassReport {
    let in_set =
        |index: usize| subset.map(|subset| subset.contains(&index)).unwrap_or(true);
    let members: Vec<usize> = (0..graph.len()).filter(|&i| in_set(i)).collect();

    let mut indegree = vec![0usize; graph.len()];
    for &index in &members {
        indegree[index] = graph
            .parents(index)
            .iter()
            .filter(|&&parent| in_set(parent))
            .count();
    }

    let mut ready: BTreeSet<usize> = members
        .iter()
        .copied()
        .filter(|&index| indegree[index] == 0)
        .collect();
    let mut statuses: Vec<Option<RunStatus>> = vec![None; graph.len()];
    let mut results: Vec<Option<RunResult>> = (0..graph.len()).map(|_| None).collect();

    let mut running: JoinSet<(usize, RunResult)> = JoinSet::new();
    let mut halted = false; // fail-fast tripped
    let mut saw_cancel = false;

    loop {
        if cancel.is_cancelled() {
            saw_cancel = true;
        }

        // Dispatch until the pool is full or nothing further is ready.
        while !saw_cancel && !halted && running.len() < opts.fan_out {
            let Some(&next) = ready.iter().next() else {
                break;
            };
            ready.remove(&next);

            let upstream_ok = graph
                .parents(next)
                .iter()
                .filter(|&&parent| in_set(parent))
                .all(|&parent| statuses[parent] == Some(RunStatus::Success));

            if !upstream_ok {
                let result = settle(graph.model(next), invocation_id, RunStatus::Skipped);
                complete(
                    graph, &in_set, next, result, &mut indegree, &mut ready, &mut statuses,
                    &mut results,
                );
                continue;
            }

            let wh = wh.clone();
            let model = graph.model(next).clone();
            let timeout = opts.statement_timeout;
            tracing::debug!(pass, model = %model.name, "dispatching model");
            running.spawn(async move {
                let result = run_model(wh, &model, invocation_id, timeout).await;
                (next, result)
            });
        }

        if running.is_empty() {
            if saw_cancel || halted || ready.is_empty() {
                break;
            }
            // Ready nodes remain but were all settled synchronously.
            continue;
        }

        match running.join_next().await {
            Some(Ok((index, result))) => {
                if opts.fail_fast && !matches!(result.status, RunStatus::Success) {
                    halted = true;
                }
                complete(
                    graph, &in_set, index, result, &mut indegree, &mut ready, &mut statuses,
                    &mut results,
                );
            }
            Some(Err(join_err)) => {
                tracing::error!(error = %join_err, "model worker failed");
                halted = true;
            }
            None => break,
        }
    }

    // Anything never reached was cancelled (or stranded by fail-fast).
    for &index in &members {
        if results[index].is_none() {
            let status = if saw_cancel {
                RunStatus::Cancelled
            } else {
                RunStatus::Skipped
            };
            results[index] = Some(settle(graph.model(index), invocation_id, status));
        }
    }

    PassReport {
        results: members
            .iter()
            .filter_map(|&index| results[index].clone())
            .collect(),
        cancelled: saw_cancel,
    }
}

#[allow(clippy::too_many_arguments)]
fn complete(
    graph: &ModelGraph,
    in_set: &dyn Fn(usize) -> bool,
    index: usize,
    result: RunResult,
    indegree: &mut [usize],
    ready: &mut BTreeSet<usize>,
    statuses: &mut [Option<RunStatus>],
    results: &mut [Option<RunResult>],
) {
    statuses[index] = Some(result.status);
    results[index] = Some(result);
    for &child in graph.children(index) {
        if !in_set(child) {
            continue;
        }
        indegree[child] -= 1;
        if indegree[child] == 0 {
            ready.insert(child);
        }
    }
}

fn settle(model: &ModelSpec, invocation_id: Uuid, status: RunStatus) -> RunResult {
    let now = Utc::now();
    RunResult {
        invocation_id,
        node_id: model.node_id.clone(),
        status,
        message: None,
        rows_affected: None,
        execution_time_seconds: 0.0,
        started_at: now,
        completed_at: now,
    }
}

/// Run one model: its statements in order, then its push hook, strictly
/// after the owning view exists.
async fn run_model(
    wh: Arc<dyn Warehouse>,
    model: &ModelSpec,
    invocation_id: Uuid,
    timeout: Duration,
) -> RunResult {
    let started_at = Utc::now();
    let clock = std::time::Instant::now();
    let mut rows: u64 = 0;

    let finish = |status: RunStatus, message: Option<String>, rows: Option<u64>| RunResult {
        invocation_id,
        node_id: model.node_id.clone(),
        status,
        message,
        rows_affected: rows,
        execution_time_seconds: clock.elapsed().as_secs_f64(),
        started_at,
        completed_at: Utc::now(),
    };

    for stmt in &model.statements {
        match tokio::time::timeout(timeout, wh.execute(stmt)).await {
            Err(_) => {
                wh.interrupt();
                return finish(RunStatus::TimedOut, Some("statement deadline exceeded".to_string()), None);
            }
            Ok(Err(err)) => {
                return finish(RunStatus::Failed, Some(format!("{err:#}")), None);
            }
            Ok(Ok(affected)) => rows += affected,
        }
    }

    if let Some(hook) = &model.post_hook {
        let merge = wh.merge(
            &hook.target,
            &hook.source,
            &hook.match_predicate,
            &hook.insert_columns,
        );
        match tokio::time::timeout(timeout, merge).await {
            Err(_) => {
                wh.interrupt();
                return finish(
                    RunStatus::TimedOut,
                    Some("push hook deadline exceeded".to_string()),
                    None,
                );
            }
            Ok(Err(err)) => {
                // A failed merge fails the run; the match key keeps the
                // retry safe.
                return finish(
                    RunStatus::Failed,
                    Some(format!("push hook merge failed: {err:#}")),
                    None,
                );
            }
            Ok(Ok(inserted)) => {
                tracing::debug!(model = %model.name, target = %hook.target, inserted, "push hook merged");
                rows += inserted;
            }
        }
    }

    finish(RunStatus::Success, None, Some(rows))
}
