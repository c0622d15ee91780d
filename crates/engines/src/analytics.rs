use super::registry::{Engine, EngineContext};
use models::{intermediate_name, Domain, ObjectName, SourceLogic, SourcePlatform};
use sqlgen::{quote_text, Expr, FromItem, Relation, Select, SqlType};
use std::sync::Arc;

/// Gap separating two sessions of one user, in seconds.
const SESSION_GAP_SECONDS: i64 = 30 * 60;

/// Column mapping of one analytics platform's event stream onto the
/// sessionized-event vocabulary shared by the sessions, events, and users
/// engines.
pub(crate) struct AnalyticsMapping {
    pub source: &'static str,
    pub object: &'static str,
    pub event_name: &'static str,
    pub event_ts: &'static str,
    /// Native timestamp units per second (1e6 for microseconds).
    pub ts_per_second: i64,
    pub user_pseudo_id: &'static str,
    pub user_id: Option<&'static str>,
    /// A platform-assigned session id. When present the gap computation
    /// is skipped and the native id adopted.
    pub native_session_id: Option<&'static str>,
    pub traffic_source: &'static str,
    pub traffic_medium: &'static str,
    pub traffic_campaign: &'static str,
    pub geo_country: &'static str,
    pub device_category: &'static str,
    pub revenue: &'static str,
    pub transaction_id: &'static str,
    pub email: Option<&'static str>,
}

pub(crate) const ANALYTICS_MAPPINGS: &[AnalyticsMapping] = &[
    AnalyticsMapping {
        source: "google_analytics",
        object: "events",
        event_name: "event_name",
        event_ts: "event_timestamp",
        ts_per_second: 1_000_000,
        user_pseudo_id: "user_pseudo_id",
        user_id: Some("user_id"),
        native_session_id: Some("ga_session_id"),
        traffic_source: "traffic_source_source",
        traffic_medium: "traffic_source_medium",
        traffic_campaign: "traffic_source_name",
        geo_country: "geo_country",
        device_category: "device_category",
        revenue: "ecommerce_purchase_revenue",
        transaction_id: "ecommerce_transaction_id",
        email: None,
    },
    AnalyticsMapping {
        source: "mixpanel",
        object: "events",
        event_name: "event",
        event_ts: "time",
        ts_per_second: 1_000,
        user_pseudo_id: "distinct_id",
        user_id: None,
        native_session_id: None,
        traffic_source: "utm_source",
        traffic_medium: "utm_medium",
        traffic_campaign: "utm_campaign",
        geo_country: "mp_country_code",
        device_category: "device_type",
        revenue: "revenue",
        transaction_id: "transaction_id",
        email: Some("email"),
    },
];

pub(crate) fn analytics_mapping(source: &str) -> Option<&'static AnalyticsMapping> {
    ANALYTICS_MAPPINGS.iter().find(|m| m.source == source)
}

/// Render a timestamp column from native units to an ISO-8601 literal.
fn ts_to_iso(expr: &str, ts_per_second: i64) -> Expr {
    Expr::raw(format!(
        "strftime('%Y-%m-%dT%H:%M:%SZ', {expr} / {ts_per_second}, 'unixepoch')"
    ))
}

/// The per-event base projection from the intermediate table, in the
/// shared sessionized-event vocabulary (minus `session_id`).
fn base_events(mapping: &AnalyticsMapping, ctx: &EngineContext) -> Select {
    let int = intermediate_name(
        ctx.tenant(),
        &SourcePlatform::new(mapping.source),
        &ObjectName::new(mapping.object),
    );

    let user_id = match mapping.user_id {
        Some(column) => Expr::cast(Expr::col(column), SqlType::Varchar),
        None => Expr::null_of(SqlType::Varchar),
    };
    let email = match mapping.email {
        Some(column) => Expr::cast(Expr::col(column), SqlType::Varchar),
        None => Expr::null_of(SqlType::Varchar),
    };

    Select::new()
        .column(Expr::col("tenant_slug"), "tenant_slug")
        .column(Expr::col("source_platform"), "source_platform")
        .column(Expr::cast(Expr::col(mapping.event_name), SqlType::Varchar), "event_name")
        .column(Expr::cast(Expr::col(mapping.event_ts), SqlType::BigInt), "ts")
        .column(
            Expr::cast(Expr::col(mapping.user_pseudo_id), SqlType::Varchar),
            "user_pseudo_id",
        )
        .column(user_id, "user_id")
        .column(
            Expr::cast(Expr::col(mapping.traffic_source), SqlType::Varchar),
            "traffic_source",
        )
        .column(
            Expr::cast(Expr::col(mapping.traffic_medium), SqlType::Varchar),
            "traffic_medium",
        )
        .column(
            Expr::cast(Expr::col(mapping.traffic_campaign), SqlType::Varchar),
            "traffic_campaign",
        )
        .column(
            Expr::cast(Expr::col(mapping.geo_country), SqlType::Varchar),
            "geo_country",
        )
        .column(
            Expr::cast(Expr::col(mapping.device_category), SqlType::Varchar),
            "device_category",
        )
        .column(Expr::cast(Expr::col(mapping.revenue), SqlType::Double), "revenue")
        .column(
            Expr::cast(Expr::col(mapping.transaction_id), SqlType::Varchar),
            "transaction_id",
        )
        .column(email, "email")
        // Ties on equal timestamps resolve by ingest order.
        .column(Expr::raw("rowid"), "ingest_order")
        .from_relation(Relation::new(int), "events")
}

/// CTEs ending in `sessionized_events`: the per-event stream with a
/// `session_id` assigned. Native-session sources adopt the platform id;
/// the rest get a new session when a user's gap exceeds thirty minutes.
pub(crate) fn sessionized_ctes(
    mapping: &AnalyticsMapping,
    ctx: &EngineContext,
) -> Vec<(String, Select)> {
    let base = base_events(mapping, ctx);

    if let Some(native) = mapping.native_session_id {
        let with_session = base.column(
            Expr::cast(Expr::col(native), SqlType::Varchar),
            "session_id",
        );
        return vec![("sessionized_events".to_string(), with_session)];
    }

    let gap_native = SESSION_GAP_SECONDS * mapping.ts_per_second;
    let order = "PARTITION BY \"user_pseudo_id\" ORDER BY \"ts\", \"ingest_order\"";

    let lagged = Select::new()
        .column_bare(Expr::raw("*"))
        .column(Expr::raw(format!("LAG(\"ts\") OVER ({order})")), "prev_ts")
        .from(FromItem::Named("event_base".to_string()), "event_base");

    let numbered = Select::new()
        .column_bare(Expr::raw("*"))
        .column(
            Expr::raw(format!(
                "SUM(CASE WHEN \"prev_ts\" IS NULL OR \"ts\" - \"prev_ts\" > {gap_native} \
                 THEN 1 ELSE 0 END) OVER ({order} ROWS UNBOUNDED PRECEDING)"
            )),
            "session_ordinal",
        )
        .from(FromItem::Named("lagged".to_string()), "lagged");

    let sessionized = Select::new()
        .column_bare(Expr::raw("*"))
        .column(
            Expr::raw("\"user_pseudo_id\" || '-' || CAST(\"session_ordinal\" AS VARCHAR)"),
            "session_id",
        )
        .from(FromItem::Named("numbered".to_string()), "numbered");

    vec![
        ("event_base".to_string(), base),
        ("lagged".to_string(), lagged),
        ("numbered".to_string(), numbered),
        ("sessionized_events".to_string(), sessionized),
    ]
}

/// Sanitize an event name into a column-name fragment.
fn sanitize(event: &str) -> String {
    event
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// The per-tenant funnel columns appended to the sessions schema:
/// `funnel_max_step`, then one pivot per configured step.
pub fn funnel_columns(logic: &SourceLogic) -> Vec<(String, SqlType)> {
    let mut columns = vec![("funnel_max_step".to_string(), SqlType::BigInt)];
    for (index, step) in logic.funnel_steps.iter().enumerate() {
        columns.push((
            format!("funnel_step_{}_{}", index + 1, sanitize(step)),
            SqlType::BigInt,
        ));
    }
    columns
}

fn conversion_flag(logic: &SourceLogic) -> Expr {
    if logic.conversion_events.is_empty() {
        // No configured conversion events: every session is
        // non-conversion, by definition.
        return Expr::raw("CAST(0 AS BOOLEAN)");
    }
    let list = logic
        .conversion_events
        .iter()
        .map(|event| quote_text(event))
        .collect::<Vec<_>>()
        .join(", ");
    Expr::raw(format!(
        "CAST(MAX(CASE WHEN \"event_name\" IN ({list}) THEN 1 ELSE 0 END) AS BOOLEAN)"
    ))
}

fn funnel_max_step(logic: &SourceLogic) -> Expr {
    if logic.funnel_steps.is_empty() {
        return Expr::raw("CAST(0 AS BIGINT)");
    }
    let arms = logic
        .funnel_steps
        .iter()
        .enumerate()
        .map(|(index, step)| format!("WHEN {} THEN {}", quote_text(step), index + 1))
        .collect::<Vec<_>>()
        .join(" ");
    Expr::raw(format!(
        "MAX(CASE \"event_name\" {arms} ELSE 0 END)"
    ))
}

pub(crate) struct SessionsEngine(pub &'static AnalyticsMapping);

impl Engine for SessionsEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::Sessions
    }

    fn requires(&self, ctx: &EngineContext) -> Vec<String> {
        vec![intermediate_name(
            ctx.tenant(),
            &self.source(),
            &ObjectName::new(self.0.object),
        )]
    }

    fn build(&self, ctx: &EngineContext) -> Select {
        let mapping = self.0;
        let logic = ctx
            .config
            .source_logic(&self.source())
            .cloned()
            .unwrap_or_default();

        let window = "PARTITION BY \"user_pseudo_id\", \"session_id\" \
                      ORDER BY \"ts\", \"ingest_order\"";
        let attributed = Select::new()
            .column_bare(Expr::raw("*"))
            .column(
                Expr::raw(format!("FIRST_VALUE(\"traffic_source\") OVER ({window})")),
                "first_traffic_source",
            )
            .column(
                Expr::raw(format!("FIRST_VALUE(\"traffic_medium\") OVER ({window})")),
                "first_traffic_medium",
            )
            .column(
                Expr::raw(format!("FIRST_VALUE(\"traffic_campaign\") OVER ({window})")),
                "first_traffic_campaign",
            )
            .column(
                Expr::raw(format!("FIRST_VALUE(\"geo_country\") OVER ({window})")),
                "first_geo_country",
            )
            .column(
                Expr::raw(format!("FIRST_VALUE(\"device_category\") OVER ({window})")),
                "first_device_category",
            )
            .from(
                FromItem::Named("sessionized_events".to_string()),
                "sessionized_events",
            );

        let scale = mapping.ts_per_second;
        let mut select = Select::new();
        for (name, cte) in sessionized_ctes(mapping, ctx) {
            select = select.with_cte(name, cte);
        }
        select = select
            .with_cte("attributed", attributed)
            .column(Expr::col("tenant_slug"), "tenant_slug")
            .column(Expr::col("source_platform"), "source_platform")
            .column(Expr::col("session_id"), "session_id")
            .column(Expr::col("user_pseudo_id"), "user_pseudo_id")
            .column(Expr::raw("MAX(\"user_id\")"), "user_id")
            .column(ts_to_iso("MIN(\"ts\")", scale), "session_start_ts")
            .column(ts_to_iso("MAX(\"ts\")", scale), "session_end_ts")
            .column(
                Expr::raw(format!(
                    "CAST(MAX(\"ts\") - MIN(\"ts\") AS DOUBLE) / {scale}.0"
                )),
                "session_duration_seconds",
            )
            .column(Expr::raw("COUNT(*)"), "events_in_session")
            .column(Expr::raw("MAX(\"first_traffic_source\")"), "traffic_source")
            .column(Expr::raw("MAX(\"first_traffic_medium\")"), "traffic_medium")
            .column(
                Expr::raw("MAX(\"first_traffic_campaign\")"),
                "traffic_campaign",
            )
            .column(Expr::raw("MAX(\"first_geo_country\")"), "geo_country")
            .column(
                Expr::raw("MAX(\"first_device_category\")"),
                "device_category",
            )
            .column(conversion_flag(&logic), "is_conversion_session")
            .column(
                Expr::raw("CAST(COALESCE(SUM(\"revenue\"), 0) AS DOUBLE)"),
                "session_revenue",
            )
            .column(Expr::raw("MAX(\"transaction_id\")"), "transaction_id")
            .column(funnel_max_step(&logic), "funnel_max_step");

        for (index, step) in logic.funnel_steps.iter().enumerate() {
            select = select.column(
                Expr::raw(format!(
                    "SUM(CASE WHEN \"event_name\" = {} THEN 1 ELSE 0 END)",
                    quote_text(step)
                )),
                format!("funnel_step_{}_{}", index + 1, sanitize(step)),
            );
        }

        select
            .from(FromItem::Named("attributed".to_string()), "attributed")
            .group(Expr::col("tenant_slug"))
            .group(Expr::col("source_platform"))
            .group(Expr::col("user_pseudo_id"))
            .group(Expr::col("session_id"))
    }
}

pub(crate) struct EventsEngine(pub &'static AnalyticsMapping);

impl Engine for EventsEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::Events
    }

    fn requires(&self, ctx: &EngineContext) -> Vec<String> {
        vec![intermediate_name(
            ctx.tenant(),
            &self.source(),
            &ObjectName::new(self.0.object),
        )]
    }

    fn build(&self, ctx: &EngineContext) -> Select {
        let mapping = self.0;
        let mut select = Select::new();
        for (name, cte) in sessionized_ctes(mapping, ctx) {
            select = select.with_cte(name, cte);
        }
        select
            .column(Expr::col("tenant_slug"), "tenant_slug")
            .column(Expr::col("source_platform"), "source_platform")
            .column(Expr::col("event_name"), "event_name")
            .column(ts_to_iso("\"ts\"", mapping.ts_per_second), "event_timestamp")
            .column(Expr::col("user_pseudo_id"), "user_pseudo_id")
            .column(Expr::col("user_id"), "user_id")
            .column(Expr::col("session_id"), "session_id")
            .column(Expr::col("transaction_id"), "order_id")
            .column(Expr::col("revenue"), "order_total")
            .column(Expr::col("traffic_source"), "traffic_source")
            .column(Expr::col("traffic_medium"), "traffic_medium")
            .column(Expr::col("traffic_campaign"), "traffic_campaign")
            .column(Expr::col("geo_country"), "geo_country")
            .column(Expr::col("device_category"), "device_category")
            .from(
                FromItem::Named("sessionized_events".to_string()),
                "sessionized_events",
            )
    }
}

pub(crate) fn engines() -> Vec<Arc<dyn Engine>> {
    let mut out: Vec<Arc<dyn Engine>> = Vec::new();
    for mapping in ANALYTICS_MAPPINGS {
        out.push(Arc::new(SessionsEngine(mapping)));
        out.push(Arc::new(EventsEngine(mapping)));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use models::{SourceSettings, TenantConfig, TenantSlug};

    fn tenant_with(source: &str, logic: SourceLogic) -> TenantConfig {
        let mut config = TenantConfig::new(TenantSlug::new("acme"), "Acme");
        config.sources.insert(
            SourcePlatform::new(source),
            SourceSettings {
                enabled: true,
                logic,
            },
        );
        config
    }

    #[test]
    fn sessions_schema_matches_canonical_plus_funnel() {
        let logic = SourceLogic {
            conversion_events: vec!["purchase".to_string()],
            funnel_steps: vec!["view_item".to_string(), "add_to_cart".to_string()],
            identity_resolution: None,
        };
        let config = tenant_with("google_analytics", logic.clone());
        let ctx = EngineContext::new(&config);

        let mapping = analytics_mapping("google_analytics").unwrap();
        let select = SessionsEngine(mapping).build(&ctx);

        let mut expected: Vec<String> = Domain::Sessions
            .canonical_columns()
            .iter()
            .map(|c| c.name.to_string())
            .collect();
        expected.extend(funnel_columns(&logic).into_iter().map(|(name, _)| name));
        assert_eq!(select.output_columns(), expected);
    }

    #[test]
    fn native_session_sources_adopt_the_platform_id() {
        let config = tenant_with("google_analytics", SourceLogic::default());
        let ctx = EngineContext::new(&config);
        let mapping = analytics_mapping("google_analytics").unwrap();

        let ctes = sessionized_ctes(mapping, &ctx);
        assert_eq!(ctes.len(), 1);
        let sql = ctes[0].1.render();
        assert!(sql.contains("CAST(\"ga_session_id\" AS VARCHAR) AS \"session_id\""));
        assert!(!sql.contains("LAG"));
    }

    #[test]
    fn gap_sources_split_sessions_on_thirty_minutes() {
        let config = tenant_with("mixpanel", SourceLogic::default());
        let ctx = EngineContext::new(&config);
        let mapping = analytics_mapping("mixpanel").unwrap();

        let ctes = sessionized_ctes(mapping, &ctx);
        let names: Vec<&str> = ctes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec!["event_base", "lagged", "numbered", "sessionized_events"]
        );
        // 30 minutes in native milliseconds.
        assert!(ctes[2].1.render().contains("> 1800000"));
    }

    #[test]
    fn empty_conversion_list_marks_every_session_non_conversion() {
        let flag = conversion_flag(&SourceLogic::default());
        assert_eq!(flag.render(), "CAST(0 AS BOOLEAN)");
    }

    #[test]
    fn funnel_column_names_sanitize_event_names() {
        let logic = SourceLogic {
            conversion_events: Vec::new(),
            funnel_steps: vec!["View Item".to_string(), "add-to-cart!".to_string()],
            identity_resolution: None,
        };
        let names: Vec<String> = funnel_columns(&logic).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "funnel_max_step",
                "funnel_step_1_view_item",
                "funnel_step_2_add_to_cart_",
            ]
        );
    }

    #[test]
    fn events_schema_matches_canonical() {
        let config = tenant_with("mixpanel", SourceLogic::default());
        let ctx = EngineContext::new(&config);
        let mapping = analytics_mapping("mixpanel").unwrap();

        let select = EventsEngine(mapping).build(&ctx);
        let expected: Vec<&str> = Domain::Events
            .canonical_columns()
            .iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(select.output_columns(), expected);
    }
}
