//! End-to-end onboarding scenarios against the embedded warehouse: a cold
//! two-pass run over a realistic source mix, push idempotence across
//! re-runs, unknown-schema rejection, and cooperative cancellation.

use engines::EngineRegistry;
use manifest::ManifestStore;
use models::{
    IdentityStrategy, SourceLogic, SourcePlatform, SourceSettings, TenantConfig, TenantSlug,
    TenantStatus,
};
use orchestrator::{Ingestor, OnboardError, Orchestrator, Settings};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warehouse::{SqliteWarehouse, Value, Warehouse};

const TENANT: &str = "tyrell_corp";

/// Create a landed table shaped exactly like the catalog entry (plus ETL
/// bookkeeping columns) and seed it. Idempotent: an existing table is
/// left untouched, like a load that already ran.
async fn land(wh: &SqliteWarehouse, tenant: &str, source: &str, object: &str, rows: &[&str]) {
    let entry = catalog::list_supported()
        .into_iter()
        .find(|e| e.source_platform.as_str() == source && e.object.as_str() == object)
        .unwrap_or_else(|| panic!("no catalog entry for {source}/{object}"));

    let table = format!("{tenant}__{source}_{object}");
    if wh.describe(&table).await.is_ok() {
        return;
    }

    let mut columns: Vec<String> = entry
        .columns
        .iter()
        .map(|(name, ty)| format!("\"{name}\" {ty}"))
        .collect();
    columns.push("\"_dlt_load_id\" VARCHAR".to_string());
    columns.push("\"_dlt_id\" VARCHAR".to_string());

    wh.execute(&format!(
        "CREATE TABLE \"{table}\" (\n{}\n)",
        columns.join(",\n")
    ))
    .await
    .unwrap();
    wh.execute(&format!("INSERT INTO \"{table}\" VALUES\n{}", rows.join(",\n")))
        .await
        .unwrap();
}

/// Lands the full Tyrell Corp source mix: three ad platforms, shopify,
/// and google_analytics.
struct FixtureIngestor {
    wh: Arc<SqliteWarehouse>,
}

#[async_trait::async_trait]
impl Ingestor for FixtureIngestor {
    async fn ingest(
        &self,
        tenant: &TenantSlug,
        source: &SourcePlatform,
        _days: u32,
    ) -> anyhow::Result<()> {
        let wh = &self.wh;
        let tenant = tenant.as_str();
        match source.as_str() {
            "facebook_ads" => {
                land(
                    wh,
                    tenant,
                    "facebook_ads",
                    "ads_insights",
                    &[
                        "('2023-11-10', 'act1', 'fc1', 'fas1', 'fad1', 12.5, 1000, 50, 2.0, 'load1', 'f1')",
                        "('2023-11-11', 'act1', 'fc1', 'fas1', 'fad2', 20.0, 2000, 80, 3.0, 'load1', 'f2')",
                    ],
                )
                .await;
                land(
                    wh,
                    tenant,
                    "facebook_ads",
                    "campaigns",
                    &["('fc1', 'Prospecting', 'ACTIVE', 'CONVERSIONS', '2023-01-01T00:00:00Z', 'load1', 'fc')"],
                )
                .await;
            }
            "instagram_ads" => {
                land(
                    wh,
                    tenant,
                    "instagram_ads",
                    "ads_insights",
                    &["('2023-11-10', 'ig1', 'ic1', 'ias1', 'iad1', 5.0, 700, 30, 1.0, 'load1', 'i1')"],
                )
                .await;
                land(
                    wh,
                    tenant,
                    "instagram_ads",
                    "campaigns",
                    &["('ic1', 'Stories', 'ACTIVE', 'TRAFFIC', 'load1', 'ic')"],
                )
                .await;
            }
            "google_ads" => {
                land(
                    wh,
                    tenant,
                    "google_ads",
                    "ad_performance_report",
                    &[
                        "('2023-11-10', 42, 901, 9001, 90001, 2500000, 1500, 60, 1.0, 'load1', 'g1')",
                        "('2023-11-11', 42, 901, 9001, 90002, 1000000, 900, 40, 0.0, 'load1', 'g2')",
                    ],
                )
                .await;
                land(
                    wh,
                    tenant,
                    "google_ads",
                    "campaigns",
                    &["(901, 'Search Brand', 'ENABLED', 'SEARCH', 'load1', 'gc')"],
                )
                .await;
            }
            "shopify" => {
                land(
                    wh,
                    tenant,
                    "shopify",
                    "orders",
                    &[
                        "(1001, '2023-11-10T12:00:00Z', 49.99, 'USD', 'paid', 'deckard@example.com', 501, '[{\"sku\":\"KD6-3.7\"}]', 'load1', 'o1')",
                        "(1002, '2023-11-12T09:30:00Z', 125.00, 'USD', 'paid', 'rachael@example.com', 502, '[{\"sku\":\"VK-01\"}]', 'load1', 'o2')",
                        "(1003, '2023-11-13T17:45:00Z', 19.50, 'USD', 'refunded', 'leon@example.com', 503, '[]', 'load1', 'o3')",
                    ],
                )
                .await;
                land(
                    wh,
                    tenant,
                    "shopify",
                    "products",
                    &[
                        "(2001, 'Voight-Kampff Kit', 199.0, 'active', '2023-01-01T00:00:00Z', 'load1', 'p1')",
                        "(2002, 'Origami Unicorn', 12.0, 'active', '2023-02-01T00:00:00Z', 'load1', 'p2')",
                    ],
                )
                .await;
            }
            "google_analytics" => {
                land(
                    wh,
                    tenant,
                    "google_analytics",
                    "events",
                    &[
                        "('2023-11-14', 1700000000000000, 'view_item', 'u1', 'alice', 's1', 'google', 'cpc', 'brand', 'US', 'mobile', NULL, NULL, '{}', 'load1', 'e1')",
                        "('2023-11-14', 1700000060000000, 'add_to_cart', 'u1', 'alice', 's1', 'google', 'cpc', 'brand', 'US', 'mobile', NULL, NULL, '{}', 'load1', 'e2')",
                        "('2023-11-14', 1700000120000000, 'purchase', 'u1', 'alice', 's1', 'google', 'cpc', 'brand', 'US', 'mobile', 49.99, '1001', '{}', 'load1', 'e3')",
                        "('2023-11-15', 1700090000000000, 'page_view', 'u1', 'alice', 's2', '(direct)', '(none)', '(none)', 'US', 'mobile', NULL, NULL, '{}', 'load1', 'e4')",
                        "('2023-11-15', 1700100000000000, 'view_item', 'u2', NULL, 's3', 'meta', 'social', 'fb_c', 'DE', 'desktop', NULL, NULL, '{}', 'load1', 'e5')",
                    ],
                )
                .await;
            }
            "mixpanel" => {
                land(
                    wh,
                    tenant,
                    "mixpanel",
                    "events",
                    &["('signup', 1700000000000, 'm1', 'mi1', 'newsletter', 'email', 'nov', 'US', 'desktop', 'm1@example.com', NULL, NULL, 'load1', 'm1')"],
                )
                .await;
            }
            other => panic!("fixture has no source {other}"),
        }
        Ok(())
    }
}

fn tyrell_config() -> TenantConfig {
    let mut config = TenantConfig::new(TenantSlug::new(TENANT), "Tyrell Corp");
    for source in ["facebook_ads", "instagram_ads", "google_ads", "shopify"] {
        config.sources.insert(
            SourcePlatform::new(source),
            SourceSettings {
                enabled: true,
                logic: SourceLogic::default(),
            },
        );
    }
    config.sources.insert(
        SourcePlatform::new("google_analytics"),
        SourceSettings {
            enabled: true,
            logic: SourceLogic {
                conversion_events: vec!["purchase".to_string()],
                funnel_steps: vec![
                    "view_item".to_string(),
                    "add_to_cart".to_string(),
                    "purchase".to_string(),
                ],
                identity_resolution: Some(IdentityStrategy::TransactionIdMatch),
            },
        },
    );
    config
}

struct Fixture {
    wh: Arc<SqliteWarehouse>,
    orchestrator: Orchestrator,
    _dir: tempfile::TempDir,
}

async fn fixture(ingestor: Arc<dyn Ingestor>, config: TenantConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let wh = Arc::new(SqliteWarehouse::open_in_memory().unwrap());
    catalog::initialize(&*wh, &catalog::list_supported())
        .await
        .unwrap();

    let manifest = Arc::new(ManifestStore::open(dir.path().join("tenants.yaml")).unwrap());
    manifest.upsert(config).unwrap();

    let orchestrator = Orchestrator::new(
        wh.clone() as Arc<dyn Warehouse>,
        manifest,
        EngineRegistry::standard(),
        ingestor,
        Settings {
            artifact_root: dir.path().join("generated"),
            ..Settings::default()
        },
    );

    Fixture {
        wh,
        orchestrator,
        _dir: dir,
    }
}

async fn count(wh: &SqliteWarehouse, table: &str) -> i64 {
    let rows = wh
        .query(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .await
        .unwrap();
    rows[0][0].as_i64().unwrap()
}

#[tokio::test]
async fn onboards_a_five_source_tenant_cold() {
    let slug = TenantSlug::new(TENANT);
    let fx = {
        let wh = Arc::new(SqliteWarehouse::open_in_memory().unwrap());
        // Share one database between ingestor and orchestrator.
        let dir = tempfile::tempdir().unwrap();
        catalog::initialize(&*wh, &catalog::list_supported())
            .await
            .unwrap();
        let manifest = Arc::new(ManifestStore::open(dir.path().join("tenants.yaml")).unwrap());
        manifest.upsert(tyrell_config()).unwrap();
        let orchestrator = Orchestrator::new(
            wh.clone() as Arc<dyn Warehouse>,
            manifest,
            EngineRegistry::standard(),
            Arc::new(FixtureIngestor { wh: wh.clone() }),
            Settings {
                artifact_root: dir.path().join("generated"),
                ..Settings::default()
            },
        );
        Fixture {
            wh,
            orchestrator,
            _dir: dir,
        }
    };

    let outcome = fx
        .orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.star_tables.len(), 7);

    // The tenant graduated.
    let config = fx.orchestrator.manifest().get(&slug).unwrap();
    assert_eq!(config.status, TenantStatus::Active);

    // Master sinks hold every pushed row, tenant-scoped.
    assert_eq!(count(&fx.wh, "shopify_v1_orders").await, 3);
    assert_eq!(count(&fx.wh, "facebook_ads_v18_ads_insights").await, 2);
    assert_eq!(count(&fx.wh, "google_analytics_v1_events").await, 5);

    // Ad performance is the union of the three ad engines.
    assert_eq!(count(&fx.wh, "fct_tyrell_corp__ad_performance").await, 5);
    let columns = fx
        .wh
        .describe("fct_tyrell_corp__ad_performance")
        .await
        .unwrap();
    assert_eq!(columns.len(), 10);
    let spend = fx
        .wh
        .query("SELECT SUM(spend) FROM \"fct_tyrell_corp__ad_performance\"")
        .await
        .unwrap();
    assert_eq!(spend[0][0], Value::Real(41.0));

    // Micro-currency sources were scaled.
    let google_spend = fx
        .wh
        .query(
            "SELECT SUM(spend) FROM \"fct_tyrell_corp__ad_performance\" \
             WHERE source_platform = 'google_ads'",
        )
        .await
        .unwrap();
    assert_eq!(google_spend[0][0], Value::Real(3.5));

    // Orders, events, sessions, and dims.
    assert_eq!(count(&fx.wh, "fct_tyrell_corp__orders").await, 3);
    assert_eq!(count(&fx.wh, "fct_tyrell_corp__events").await, 5);
    assert_eq!(count(&fx.wh, "fct_tyrell_corp__sessions").await, 3);
    assert_eq!(count(&fx.wh, "dim_tyrell_corp__campaigns").await, 3);
    assert_eq!(count(&fx.wh, "dim_tyrell_corp__products").await, 2);
    assert_eq!(count(&fx.wh, "dim_tyrell_corp__users").await, 2);

    // Sessionization: s1 converted and walked the full funnel.
    let s1 = fx
        .wh
        .query(
            "SELECT is_conversion_session, funnel_max_step, session_revenue, events_in_session \
             FROM \"fct_tyrell_corp__sessions\" WHERE session_id = 's1'",
        )
        .await
        .unwrap();
    assert_eq!(s1[0][0], Value::Integer(1));
    assert_eq!(s1[0][1], Value::Integer(3));
    assert_eq!(s1[0][2], Value::Real(49.99));
    assert_eq!(s1[0][3], Value::Integer(3));

    let s2 = fx
        .wh
        .query(
            "SELECT is_conversion_session, funnel_max_step \
             FROM \"fct_tyrell_corp__sessions\" WHERE session_id = 's2'",
        )
        .await
        .unwrap();
    assert_eq!(s2[0][0], Value::Integer(0));
    assert_eq!(s2[0][1], Value::Integer(0));

    // Identity resolution: u1 purchased order 1001; u2 never converted.
    let users = fx
        .wh
        .query(
            "SELECT user_pseudo_id, is_customer, customer_id, total_sessions \
             FROM \"dim_tyrell_corp__users\" ORDER BY user_pseudo_id",
        )
        .await
        .unwrap();
    assert_eq!(users[0][1], Value::Integer(1));
    assert_eq!(users[0][2], Value::Text("501".to_string()));
    assert_eq!(users[0][3], Value::Integer(2));
    assert_eq!(users[1][1], Value::Integer(0));

    // Two-pass bootstrap: after pass B, intermediates mirror their sinks.
    assert_eq!(count(&fx.wh, "int_tyrell_corp__shopify_orders").await, 3);
    assert_eq!(
        count(&fx.wh, "int_tyrell_corp__google_analytics_events").await,
        5
    );

    // Tenant isolation: every mart row carries the tenant slug.
    let foreign = fx
        .wh
        .query(
            "SELECT COUNT(*) FROM \"fct_tyrell_corp__ad_performance\" \
             WHERE tenant_slug != 'tyrell_corp' OR tenant_slug IS NULL",
        )
        .await
        .unwrap();
    assert_eq!(foreign[0][0], Value::Integer(0));

    // Data tests ran over the reporting subtree and all passed: two
    // checks per relation, nine intermediates plus seven marts.
    let test_rows = fx
        .wh
        .query("SELECT COUNT(*) FROM \"test_artifacts\" WHERE status = 'success'")
        .await
        .unwrap();
    assert_eq!(test_rows[0][0], Value::Integer(32));
    let test_failures = fx
        .wh
        .query("SELECT COUNT(*) FROM \"test_artifacts\" WHERE status != 'success'")
        .await
        .unwrap();
    assert_eq!(test_failures[0][0], Value::Integer(0));
}

#[tokio::test]
async fn rerun_is_idempotent_and_picks_up_new_rows() {
    let slug = TenantSlug::new(TENANT);
    let wh = Arc::new(SqliteWarehouse::open_in_memory().unwrap());
    let dir = tempfile::tempdir().unwrap();
    catalog::initialize(&*wh, &catalog::list_supported())
        .await
        .unwrap();
    let manifest = Arc::new(ManifestStore::open(dir.path().join("tenants.yaml")).unwrap());
    manifest.upsert(tyrell_config()).unwrap();
    let orchestrator = Orchestrator::new(
        wh.clone() as Arc<dyn Warehouse>,
        manifest,
        EngineRegistry::standard(),
        Arc::new(FixtureIngestor { wh: wh.clone() }),
        Settings {
            artifact_root: dir.path().join("generated"),
            ..Settings::default()
        },
    );

    orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(count(&wh, "shopify_v1_orders").await, 3);

    // Re-running the whole pipeline against unchanged sources pushes
    // nothing new.
    orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(count(&wh, "shopify_v1_orders").await, 3);
    assert_eq!(count(&wh, "fct_tyrell_corp__orders").await, 3);

    // One new landed record: exactly one additional master row.
    wh.execute(
        "INSERT INTO \"tyrell_corp__shopify_orders\" VALUES \
         (1004, '2023-11-20T08:00:00Z', 75.0, 'USD', 'paid', 'pris@example.com', 504, '[]', 'load2', 'o4')",
    )
    .await
    .unwrap();
    orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(count(&wh, "shopify_v1_orders").await, 4);
    assert_eq!(count(&wh, "fct_tyrell_corp__orders").await, 4);
}

#[tokio::test]
async fn unknown_schema_fails_cleanly_before_any_artifact() {
    let slug = TenantSlug::new(TENANT);
    let mut config = TenantConfig::new(slug.clone(), "Tyrell Corp");
    config.sources.insert(
        SourcePlatform::new("shopify"),
        SourceSettings {
            enabled: true,
            logic: SourceLogic::default(),
        },
    );

    let fx = fixture(Arc::new(orchestrator::NoopIngestor), config).await;

    // A landed table with one unexpected column.
    fx.wh
        .execute(
            "CREATE TABLE \"tyrell_corp__shopify_orders\" (\n\
             \"id\" BIGINT, \"created_at\" TIMESTAMP, \"total_price\" DOUBLE,\n\
             \"currency\" VARCHAR, \"financial_status\" VARCHAR, \"email\" VARCHAR,\n\
             \"customer_id\" BIGINT, \"line_items\" JSON, \"surprise\" VARCHAR)",
        )
        .await
        .unwrap();

    let err = fx
        .orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
    match err {
        OnboardError::Scaffold(scaffold::Error::UnknownSchema { closest, .. }) => {
            let closest = closest.unwrap();
            assert_eq!(closest.master_model_id, "shopify_v1_orders");
            assert_eq!(closest.differing_columns, vec!["surprise"]);
        }
        other => panic!("expected UnknownSchema, got {other:?}"),
    }

    // No scaffold output, no master sink.
    assert!(fx.wh.describe("shopify_v1_orders").await.is_err());
    assert!(fx.wh.describe("stg_tyrell_corp__shopify_orders").await.is_err());

    // The tenant did not graduate.
    let config = fx.orchestrator.manifest().get(&slug).unwrap();
    assert_eq!(config.status, TenantStatus::Onboarding);
}

/// Cancels the run token as soon as ingestion is invoked.
struct CancellingIngestor(CancellationToken);

#[async_trait::async_trait]
impl Ingestor for CancellingIngestor {
    async fn ingest(
        &self,
        _tenant: &TenantSlug,
        _source: &SourcePlatform,
        _days: u32,
    ) -> anyhow::Result<()> {
        self.0.cancel();
        Ok(())
    }
}

#[tokio::test]
async fn cancellation_stops_scheduling_and_records_the_run() {
    let slug = TenantSlug::new(TENANT);
    let mut config = TenantConfig::new(slug.clone(), "Tyrell Corp");
    config.sources.insert(
        SourcePlatform::new("shopify"),
        SourceSettings {
            enabled: true,
            logic: SourceLogic::default(),
        },
    );

    let cancel = CancellationToken::new();
    let fx = fixture(Arc::new(CancellingIngestor(cancel.clone())), config).await;

    let err = fx
        .orchestrator
        .onboard(&slug, 30, cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardError::Cancelled));
    assert_eq!(err.exit_code(), 5);

    // The cancelled models were still recorded for observability.
    let cancelled = fx
        .wh
        .query("SELECT COUNT(*) FROM \"run_results\" WHERE status = 'cancelled'")
        .await
        .unwrap();
    assert!(cancelled[0][0].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn gap_sessionization_splits_on_thirty_minutes() {
    let slug = TenantSlug::new("wallace");
    let mut config = TenantConfig::new(slug.clone(), "Wallace Corp");
    config.sources.insert(
        SourcePlatform::new("mixpanel"),
        SourceSettings {
            enabled: true,
            logic: SourceLogic::default(),
        },
    );

    let fx = fixture(Arc::new(orchestrator::NoopIngestor), config).await;

    // One user with a 35-minute gap between the second and third event,
    // one user with a single event. Times are native milliseconds.
    land(
        &fx.wh,
        "wallace",
        "mixpanel",
        "events",
        &[
            "('page_view', 1700000000000, 'm1', 'i1', 'newsletter', 'email', 'nov', 'US', 'desktop', 'm1@example.com', NULL, NULL, 'load1', 'x1')",
            "('view_item', 1700000600000, 'm1', 'i2', 'newsletter', 'email', 'nov', 'US', 'desktop', 'm1@example.com', NULL, NULL, 'load1', 'x2')",
            "('purchase', 1700002700000, 'm1', 'i3', 'newsletter', 'email', 'nov', 'US', 'desktop', 'm1@example.com', 20.0, 'ORD-9', 'load1', 'x3')",
            "('page_view', 1700000100000, 'm2', 'i4', '(direct)', '(none)', '(none)', 'FR', 'mobile', NULL, NULL, NULL, 'load1', 'x4')",
        ],
    )
    .await;

    fx.orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count(&fx.wh, "fct_wallace__sessions").await, 3);

    let sessions = fx
        .wh
        .query(
            "SELECT session_id, events_in_session, session_duration_seconds \
             FROM \"fct_wallace__sessions\" ORDER BY session_id",
        )
        .await
        .unwrap();
    assert_eq!(sessions[0][0], Value::Text("m1-1".to_string()));
    assert_eq!(sessions[0][1], Value::Integer(2));
    assert_eq!(sessions[0][2], Value::Real(600.0));
    assert_eq!(sessions[1][0], Value::Text("m1-2".to_string()));
    assert_eq!(sessions[1][1], Value::Integer(1));
    assert_eq!(sessions[2][0], Value::Text("m2-1".to_string()));

    // No conversion events configured: every session is non-conversion.
    let conversions = fx
        .wh
        .query("SELECT MAX(is_conversion_session) FROM \"fct_wallace__sessions\"")
        .await
        .unwrap();
    assert_eq!(conversions[0][0], Value::Integer(0));

    // No commerce source: analytics users exist but none are customers.
    assert_eq!(count(&fx.wh, "dim_wallace__users").await, 2);
    let customers = fx
        .wh
        .query("SELECT MAX(is_customer) FROM \"dim_wallace__users\"")
        .await
        .unwrap();
    assert_eq!(customers[0][0], Value::Integer(0));
}

#[tokio::test]
async fn two_analytics_sources_are_rejected() {
    let slug = TenantSlug::new(TENANT);
    let mut config = tyrell_config();
    config.sources.insert(
        SourcePlatform::new("mixpanel"),
        SourceSettings {
            enabled: true,
            logic: SourceLogic::default(),
        },
    );

    let wh = Arc::new(SqliteWarehouse::open_in_memory().unwrap());
    let dir = tempfile::tempdir().unwrap();
    catalog::initialize(&*wh, &catalog::list_supported())
        .await
        .unwrap();
    let manifest = Arc::new(ManifestStore::open(dir.path().join("tenants.yaml")).unwrap());
    manifest.upsert(config).unwrap();
    let orchestrator = Orchestrator::new(
        wh.clone() as Arc<dyn Warehouse>,
        manifest,
        EngineRegistry::standard(),
        Arc::new(FixtureIngestor { wh: wh.clone() }),
        Settings {
            artifact_root: dir.path().join("generated"),
            ..Settings::default()
        },
    );

    let err = orchestrator
        .onboard(&slug, 30, CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        OnboardError::Factory(engines::Error::AmbiguousAnalyticsSource { sources, .. }) => {
            assert_eq!(sources, vec!["google_analytics", "mixpanel"]);
        }
        other => panic!("expected AmbiguousAnalyticsSource, got {other:?}"),
    }
}
