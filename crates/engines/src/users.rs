use super::analytics::{analytics_mapping, sessionized_ctes, AnalyticsMapping, ANALYTICS_MAPPINGS};
use super::commerce::{orders_mapping, OrdersMapping};
use super::registry::{Engine, EngineContext};
use models::{
    intermediate_name, Domain, IdentityStrategy, ObjectName, SourcePlatform,
};
use sqlgen::{Expr, FromItem, Join, JoinKind, Relation, Select, SqlType};
use std::sync::Arc;

/// The tenant's first enabled commerce source with an orders mapping, if
/// any. Declaration order decides, as everywhere else.
fn enabled_commerce(ctx: &EngineContext) -> Option<&'static OrdersMapping> {
    ctx.config
        .enabled_sources()
        .find_map(|source| orders_mapping(source.as_str()))
}

fn identity_strategy(ctx: &EngineContext, source: &SourcePlatform) -> IdentityStrategy {
    ctx.config
        .source_logic(source)
        .and_then(|logic| logic.identity_resolution)
        .unwrap_or(IdentityStrategy::TransactionIdMatch)
}

/// One row per `user_pseudo_id`: activity aggregates from the analytics
/// stream, linked to ecommerce orders by the tenant's declared identity
/// strategy. Any matching link makes the user a customer.
pub(crate) struct UsersEngine(pub &'static AnalyticsMapping);

impl Engine for UsersEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::Users
    }

    fn requires(&self, ctx: &EngineContext) -> Vec<String> {
        let mut required = vec![intermediate_name(
            ctx.tenant(),
            &self.source(),
            &ObjectName::new(self.0.object),
        )];
        if let Some(orders) = enabled_commerce(ctx) {
            required.push(intermediate_name(
                ctx.tenant(),
                &SourcePlatform::new(orders.source),
                &ObjectName::new(orders.object),
            ));
        }
        required
    }

    fn build(&self, ctx: &EngineContext) -> Select {
        let mapping = self.0;
        let scale = mapping.ts_per_second;
        let window = "PARTITION BY \"user_pseudo_id\" ORDER BY \"ts\", \"ingest_order\"";

        // Per-event rows with first-touch geo and device per user.
        let attributed = Select::new()
            .column_bare(Expr::raw("*"))
            .column(
                Expr::raw(format!("FIRST_VALUE(\"geo_country\") OVER ({window})")),
                "user_first_geo",
            )
            .column(
                Expr::raw(format!("FIRST_VALUE(\"device_category\") OVER ({window})")),
                "user_first_device",
            )
            .from(
                FromItem::Named("sessionized_events".to_string()),
                "sessionized_events",
            );

        let user_stats = Select::new()
            .column(Expr::col("tenant_slug"), "tenant_slug")
            .column(Expr::col("source_platform"), "source_platform")
            .column(Expr::col("user_pseudo_id"), "user_pseudo_id")
            .column(Expr::raw("MAX(\"user_id\")"), "user_id")
            .column(Expr::raw("MAX(\"email\")"), "analytics_email")
            .column(Expr::raw("MIN(\"ts\")"), "first_ts")
            .column(Expr::raw("MAX(\"ts\")"), "last_ts")
            .column(Expr::raw("COUNT(*)"), "total_events")
            .column(
                Expr::raw("COUNT(DISTINCT \"session_id\")"),
                "total_sessions",
            )
            .column(Expr::raw("MAX(\"user_first_geo\")"), "first_geo_country")
            .column(
                Expr::raw("MAX(\"user_first_device\")"),
                "first_device_category",
            )
            .from(FromItem::Named("attributed".to_string()), "attributed")
            .group(Expr::col("tenant_slug"))
            .group(Expr::col("source_platform"))
            .group(Expr::col("user_pseudo_id"));

        let mut select = Select::new();
        for (name, cte) in sessionized_ctes(mapping, ctx) {
            select = select.with_cte(name, cte);
        }
        select = select
            .with_cte("attributed", attributed)
            .with_cte("user_stats", user_stats);

        let links = enabled_commerce(ctx).map(|orders| {
            let strategy = identity_strategy(ctx, &self.source());
            let orders_int = intermediate_name(
                ctx.tenant(),
                &SourcePlatform::new(orders.source),
                &ObjectName::new(orders.object),
            );
            let on = match strategy {
                IdentityStrategy::TransactionIdMatch => Expr::raw(format!(
                    "CAST(\"e\".\"transaction_id\" AS VARCHAR) = CAST(\"o\".{} AS VARCHAR)",
                    sqlgen::quote_ident(orders.order_id)
                )),
                IdentityStrategy::EmailMatch => Expr::raw(format!(
                    "LOWER(\"e\".\"email\") = LOWER(\"o\".{})",
                    sqlgen::quote_ident(orders.customer_email)
                )),
            };

            Select::new()
                .column(Expr::qual("e", "user_pseudo_id"), "user_pseudo_id")
                .column(
                    Expr::raw(format!(
                        "MAX(\"o\".{})",
                        sqlgen::quote_ident(orders.customer_email)
                    )),
                    "customer_email",
                )
                .column(
                    Expr::raw(format!(
                        "MAX(CAST(\"o\".{} AS VARCHAR))",
                        sqlgen::quote_ident(orders.customer_id)
                    )),
                    "customer_id",
                )
                .from(FromItem::Named("sessionized_events".to_string()), "e")
                .join(Join {
                    kind: JoinKind::Inner,
                    item: FromItem::Relation(Relation::new(orders_int)),
                    alias: "o".to_string(),
                    on,
                })
                .group(Expr::qual("e", "user_pseudo_id"))
        });

        let (customer_email, customer_id, is_customer) = match &links {
            Some(_) => (
                Expr::qual("l", "customer_email"),
                Expr::qual("l", "customer_id"),
                Expr::raw(
                    "CAST(CASE WHEN \"l\".\"user_pseudo_id\" IS NOT NULL \
                     THEN 1 ELSE 0 END AS BOOLEAN)",
                ),
            ),
            None => (
                Expr::null_of(SqlType::Varchar),
                Expr::null_of(SqlType::Varchar),
                Expr::raw("CAST(0 AS BOOLEAN)"),
            ),
        };

        if let Some(links) = links {
            select = select.with_cte("links", links);
        }

        let ts_iso = |expr: &str| {
            Expr::raw(format!(
                "strftime('%Y-%m-%dT%H:%M:%SZ', {expr} / {scale}, 'unixepoch')"
            ))
        };

        let mut select = select
            .column(Expr::qual("u", "tenant_slug"), "tenant_slug")
            .column(Expr::qual("u", "source_platform"), "source_platform")
            .column(Expr::qual("u", "user_pseudo_id"), "user_pseudo_id")
            .column(Expr::qual("u", "user_id"), "user_id")
            .column(customer_email, "customer_email")
            .column(customer_id, "customer_id")
            .column(is_customer, "is_customer")
            .column(ts_iso("\"u\".\"first_ts\""), "first_seen_at")
            .column(ts_iso("\"u\".\"last_ts\""), "last_seen_at")
            .column(Expr::qual("u", "total_events"), "total_events")
            .column(Expr::qual("u", "total_sessions"), "total_sessions")
            .column(Expr::qual("u", "first_geo_country"), "first_geo_country")
            .column(
                Expr::qual("u", "first_device_category"),
                "first_device_category",
            )
            .from(FromItem::Named("user_stats".to_string()), "u");

        if enabled_commerce(ctx).is_some() {
            select = select.join(Join {
                kind: JoinKind::Left,
                item: FromItem::Named("links".to_string()),
                alias: "l".to_string(),
                on: Expr::raw("\"u\".\"user_pseudo_id\" = \"l\".\"user_pseudo_id\""),
            });
        }

        select
    }
}

pub(crate) fn engines() -> Vec<Arc<dyn Engine>> {
    ANALYTICS_MAPPINGS
        .iter()
        .map(|mapping| Arc::new(UsersEngine(mapping)) as Arc<dyn Engine>)
        .collect()
}
