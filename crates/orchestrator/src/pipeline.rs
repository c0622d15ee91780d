use super::materialize::{execute_pass, ExecOptions};
use super::{
    record_run, run_data_tests, DataTest, Ingestor, ModelGraph, OnboardError, StatusBoard,
};
use engines::{EngineContext, EngineRegistry};
use manifest::ManifestStore;
use models::{
    Domain, ModelSpec, ObjectName, ReadinessStatus, RunResult, TenantSlug, TenantStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warehouse::Warehouse;

#[derive(Clone, Debug)]
pub struct Settings {
    pub fan_out: usize,
    pub statement_timeout: Duration,
    pub fail_fast: bool,
    /// Root of generated SQL artifacts.
    pub artifact_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fan_out: 4,
            statement_timeout: Duration::from_secs(60),
            fail_fast: false,
            artifact_root: PathBuf::from(".stardeck/generated"),
        }
    }
}

#[derive(Debug)]
pub struct OnboardOutcome {
    pub invocation_id: Uuid,
    /// Results of both materialization passes, appended.
    pub results: Vec<RunResult>,
    pub star_tables: Vec<String>,
}

/// Drives tenant onboarding end to end. Different tenants may be onboarded
/// concurrently; within one run, models execute per the graph's edges up
/// to the configured fan-out.
pub struct Orchestrator {
    wh: Arc<dyn Warehouse>,
    manifest: Arc<ManifestStore>,
    engines: EngineRegistry,
    ingestor: Arc<dyn Ingestor>,
    settings: Settings,
    status: StatusBoard,
}

impl Orchestrator {
    pub fn new(
        wh: Arc<dyn Warehouse>,
        manifest: Arc<ManifestStore>,
        engines: EngineRegistry,
        ingestor: Arc<dyn Ingestor>,
        settings: Settings,
    ) -> Self {
        Self {
            wh,
            manifest,
            engines,
            ingestor,
            settings,
            status: StatusBoard::default(),
        }
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.wh
    }

    pub fn manifest(&self) -> &Arc<ManifestStore> {
        &self.manifest
    }

    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Onboard one tenant: ingest `days` of history, scaffold every landed
    /// table, compile and materialize the model graph (two passes), record
    /// observability artifacts, and flip the tenant active on success.
    #[tracing::instrument(skip(self, cancel), fields(tenant = %slug))]
    pub async fn onboard(
        &self,
        slug: &TenantSlug,
        days: u32,
        cancel: CancellationToken,
    ) -> Result<OnboardOutcome, OnboardError> {
        let config = self.manifest.get(slug).ok_or_else(|| OnboardError::UnknownTenant {
            slug: slug.to_string(),
        })?;
        let invocation_id = Uuid::new_v4();
        self.status.set_load_id(slug, invocation_id.to_string());

        // Ingestion: the external adapters land raw rows per source.
        self.status
            .update(slug, ReadinessStatus::Ingesting, None);
        for source in config.enabled_sources() {
            if cancel.is_cancelled() {
                return self.bail_cancelled(slug, invocation_id, &[], &[]).await;
            }
            self.ingestor
                .ingest(slug, source, days)
                .await
                .map_err(|err| {
                    self.status.update(
                        slug,
                        ReadinessStatus::Error,
                        Some(format!("ingestion failed for {source}")),
                    );
                    OnboardError::Ingest {
                        source_name: source.to_string(),
                        message: format!("{err:#}"),
                    }
                })?;
        }

        // Scaffold every landed table of every enabled source.
        self.status.update(slug, ReadinessStatus::Modeling, None);
        let landed = self.wh.list_tables(slug.as_str()).await?;

        let mut masters: BTreeMap<String, ModelSpec> = BTreeMap::new();
        let mut tenant_models: Vec<ModelSpec> = Vec::new();
        let mut intermediates: BTreeSet<String> = BTreeSet::new();

        for source in config.enabled_sources() {
            let prefix = format!("{slug}__{source}_");
            for table in &landed {
                let Some(object) = table.strip_prefix(&prefix) else {
                    continue;
                };
                let object = ObjectName::new(object);

                let output =
                    scaffold::scaffold_landed_table(&*self.wh, slug, source, &object).await?;
                let spec = scaffold::extraction_spec_from_schema(&output.canonical_schema);
                let unpacker = scaffold::intermediate_model(
                    slug,
                    source,
                    &object,
                    &output.master_model_id,
                    &spec,
                );
                intermediates.insert(unpacker.name.clone());

                for model in output.models {
                    match model.layer {
                        models::Layer::MasterSink => {
                            masters.entry(model.name.clone()).or_insert(model);
                        }
                        _ => tenant_models.push(model),
                    }
                }
                tenant_models.push(unpacker);
            }
        }
        tracing::info!(
            landed = landed.len(),
            scaffolded = intermediates.len(),
            "scaffolded landed tables"
        );

        // Resolve the star schema for every domain.
        let ctx = EngineContext::new(&config);
        let mut star_tables = Vec::with_capacity(Domain::ALL.len());
        for domain in Domain::ALL {
            let model =
                engines::build_star_model(&self.engines, &ctx, domain, Some(&intermediates))?;
            star_tables.push(model.name.clone());
            tenant_models.push(model);
        }

        let all_models: Vec<ModelSpec> = masters
            .into_values()
            .chain(tenant_models.into_iter())
            .collect();
        scaffold::write_artifacts(&self.settings.artifact_root, slug, &all_models)?;

        // Compile and materialize.
        let graph = ModelGraph::compile(all_models)?;
        let opts = ExecOptions {
            fan_out: self.settings.fan_out,
            statement_timeout: self.settings.statement_timeout,
            fail_fast: self.settings.fail_fast,
        };

        let pass_a = execute_pass(
            self.wh.clone(),
            &graph,
            None,
            &opts,
            &cancel,
            invocation_id,
            "a",
        )
        .await;
        if pass_a.cancelled {
            return self
                .bail_cancelled(slug, invocation_id, graph.models(), &pass_a.results)
                .await;
        }

        // Reporting refresh: rematerialize the intermediate and mart
        // subtree, which now observes every push that landed in pass A.
        let subset = graph.reporting_subtree();
        let pass_b = execute_pass(
            self.wh.clone(),
            &graph,
            Some(&subset),
            &opts,
            &cancel,
            invocation_id,
            "b",
        )
        .await;

        let mut results = pass_a.results;
        results.extend(pass_b.results.iter().cloned());

        if pass_b.cancelled {
            return self
                .bail_cancelled(slug, invocation_id, graph.models(), &results)
                .await;
        }

        // Data-quality checks over the rebuilt reporting subtree.
        let data_tests = reporting_data_tests(graph.models(), slug);
        let test_outcomes = run_data_tests(&*self.wh, &data_tests).await;

        self.status.update(slug, ReadinessStatus::Cataloging, None);
        record_run(
            &*self.wh,
            invocation_id,
            graph.models(),
            &results,
            &test_outcomes,
        )
        .await?;

        let failed = results
            .iter()
            .filter(|r| {
                !matches!(
                    r.status,
                    models::RunStatus::Success | models::RunStatus::Skipped
                )
            })
            .count();
        if failed > 0 {
            self.status.update(
                slug,
                ReadinessStatus::Error,
                Some(format!("{failed} models failed")),
            );
            return Err(OnboardError::ModelsFailed {
                failed,
                total: results.len(),
            });
        }

        let failed_tests = test_outcomes
            .iter()
            .filter(|outcome| !matches!(outcome.status, models::RunStatus::Success))
            .count();
        if failed_tests > 0 {
            self.status.update(
                slug,
                ReadinessStatus::Error,
                Some(format!("{failed_tests} data tests failed")),
            );
            return Err(OnboardError::DataTestsFailed {
                failed: failed_tests,
                total: test_outcomes.len(),
            });
        }

        // All good: the tenant graduates.
        let updated = self.manifest.mark_status(slug, TenantStatus::Active)?;
        manifest::record_history(&*self.wh, &updated).await?;
        self.status.update(slug, ReadinessStatus::Ready, None);
        tracing::info!(%invocation_id, stars = star_tables.len(), "onboarding complete");

        Ok(OnboardOutcome {
            invocation_id,
            results,
            star_tables,
        })
    }

    /// Cooperative shutdown: record what ran, mark the tenant errored, and
    /// surface `Cancelled`.
    async fn bail_cancelled(
        &self,
        slug: &TenantSlug,
        invocation_id: Uuid,
        models: &[ModelSpec],
        results: &[RunResult],
    ) -> Result<OnboardOutcome, OnboardError> {
        if let Err(err) = record_run(&*self.wh, invocation_id, models, results, &[]).await {
            tracing::warn!(error = %err, "failed to record cancelled run");
        }
        self.status.update(
            slug,
            ReadinessStatus::Error,
            Some("run cancelled".to_string()),
        );
        Err(OnboardError::Cancelled)
    }
}

/// The standard data-quality checks over a tenant's reporting relations:
/// every intermediate and mart row must carry the non-null, matching
/// tenant slug. Master sinks and views are covered upstream by the
/// staging contract.
fn reporting_data_tests(models: &[ModelSpec], slug: &TenantSlug) -> Vec<DataTest> {
    let mut tests = Vec::new();
    for model in models {
        if !matches!(
            model.layer,
            models::Layer::Intermediate | models::Layer::Mart
        ) {
            continue;
        }
        let relation = sqlgen::quote_ident(&model.name);
        tests.push(DataTest {
            node_id: model.node_id.clone(),
            test_name: "not_null_tenant_slug".to_string(),
            check_sql: format!(
                "SELECT COUNT(*) FROM {relation} WHERE \"tenant_slug\" IS NULL"
            ),
        });
        tests.push(DataTest {
            node_id: model.node_id.clone(),
            test_name: "tenant_isolation".to_string(),
            check_sql: format!(
                "SELECT COUNT(*) FROM {relation} WHERE \"tenant_slug\" != {}",
                sqlgen::quote_text(slug.as_str())
            ),
        });
    }
    tests
}
