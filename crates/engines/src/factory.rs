use super::analytics::funnel_columns;
use super::registry::{EngineContext, EngineRegistry};
use super::Error;
use models::{
    star_name, CompositionStyle, Domain, Layer, Materialization, ModelSpec, SourceLogic,
};
use sqlgen::{ColumnDef, Expr, Query, Relation, Select, SqlType, Statement};
use std::collections::BTreeSet;

/// The typed empty result: NULL-cast literals for every canonical column,
/// filtered to zero rows. Keeps the star table present and typed for a
/// tenant that has not onboarded the domain.
pub fn typed_empty(domain: Domain, extra_columns: &[(String, SqlType)]) -> Select {
    let mut select = Select::new();
    for column in domain.canonical_columns() {
        select = select.column(Expr::null_of(column.ty), column.name);
    }
    for (name, ty) in extra_columns {
        select = select.column(Expr::null_of(*ty), name.clone());
    }
    select.filter(Expr::raw("1=0"))
}

/// Resolve and assemble one star-schema model for a tenant and domain.
///
/// Enabled sources are probed against the engine map in manifest
/// declaration order. UNION domains compose every match with UNION ALL;
/// single-analytics-source domains admit exactly one enabled analytics
/// source; and zero matches fall back to the typed empty result.
///
/// When `available` is given, an engine whose required intermediates are
/// not all present is treated as missing (its upstream vanished, e.g. a
/// source toggled off mid-history); the run still succeeds.
pub fn build_star_model(
    registry: &EngineRegistry,
    ctx: &EngineContext,
    domain: Domain,
    available: Option<&BTreeSet<String>>,
) -> Result<ModelSpec, Error> {
    let tenant = ctx.tenant().clone();
    let kind = domain.kind();
    let name = star_name(kind, &tenant, domain);
    let relation = Relation::new(&name);

    let mut arms: Vec<Select> = Vec::new();
    let mut depends_on: Vec<String> = Vec::new();
    let mut session_logic: Option<SourceLogic> = None;

    let upstream_present = |required: &[String]| match available {
        Some(available) => {
            let missing: Vec<_> = required
                .iter()
                .filter(|name| !available.contains(*name))
                .collect();
            if !missing.is_empty() {
                tracing::warn!(tenant = %ctx.tenant(), %domain, ?missing, "engine upstream missing; substituting");
            }
            missing.is_empty()
        }
        None => true,
    };

    match domain.composition() {
        CompositionStyle::UnionAll => {
            for source in ctx.config.enabled_sources() {
                if let Some(engine) = registry.get(source, domain) {
                    let required = engine.requires(ctx);
                    if !upstream_present(&required) {
                        continue;
                    }
                    arms.push(engine.build(ctx));
                    depends_on.extend(required);
                }
            }
        }
        CompositionStyle::SingleAnalyticsSource => {
            let analytics: Vec<_> = ctx
                .config
                .enabled_sources()
                .filter(|source| registry.is_analytics_source(source))
                .collect();
            if analytics.len() > 1 {
                return Err(Error::AmbiguousAnalyticsSource {
                    tenant: tenant.to_string(),
                    domain,
                    sources: analytics.iter().map(|s| s.to_string()).collect(),
                });
            }
            if let Some(source) = analytics.first() {
                if let Some(engine) = registry.get(source, domain) {
                    let required = engine.requires(ctx);
                    if upstream_present(&required) {
                        arms.push(engine.build(ctx));
                        depends_on.extend(required);
                        session_logic = ctx.config.source_logic(source).cloned();
                    }
                }
            }
        }
    }

    // Sessions carry the tenant's funnel columns; the typed empty result
    // still carries `funnel_max_step` so the table shape is stable.
    let extra_columns: Vec<(String, SqlType)> = match domain {
        Domain::Sessions => funnel_columns(&session_logic.unwrap_or_default()),
        _ => Vec::new(),
    };

    let query = match arms.len() {
        0 => {
            tracing::debug!(tenant = %tenant, domain = %domain, "no engine matched; emitting typed empty result");
            Query::Select(typed_empty(domain, &extra_columns))
        }
        1 => Query::Select(arms.remove(0)),
        _ => Query::UnionAll(arms),
    };

    let mut columns: Vec<ColumnDef> = domain
        .canonical_columns()
        .iter()
        .map(|column| ColumnDef::new(column.name, column.ty))
        .collect();
    for (extra, ty) in &extra_columns {
        columns.push(ColumnDef::new(extra, *ty));
    }
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    Ok(ModelSpec {
        node_id: format!("model.{tenant}.{name}"),
        name: name.clone(),
        layer: Layer::Mart,
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
                query,
            }
            .render(),
        ],
        depends_on,
        post_hook: None,
        tags: vec![kind.prefix().to_string(), domain.as_str().to_string()],
    })
}
