//! The thin HTTP surface consumed by the frontend: submit an onboarding
//! request, poll tenant readiness. Everything else lives behind the CLI.

use super::Orchestrator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use indexmap::IndexMap;
use models::{Readiness, SourcePlatform, SourceSettings, TenantConfig, TenantSlug};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone)]
struct ApiState {
    orchestrator: Arc<Orchestrator>,
    days: u32,
}

#[derive(Deserialize)]
struct OnboardRequest {
    tenant_slug: TenantSlug,
    business_name: String,
    #[serde(default)]
    sources: IndexMap<SourcePlatform, SourceSettings>,
}

#[derive(Serialize)]
struct OnboardAccepted {
    provisioning_token: Uuid,
}

pub fn router(orchestrator: Arc<Orchestrator>, days: u32) -> Router {
    Router::new()
        .route("/onboard", post(onboard))
        .route("/readiness/:tenant_slug", get(readiness))
        .with_state(ApiState { orchestrator, days })
}

async fn onboard(
    State(state): State<ApiState>,
    Json(request): Json<OnboardRequest>,
) -> Result<(StatusCode, Json<OnboardAccepted>), (StatusCode, String)> {
    let mut config = TenantConfig::new(request.tenant_slug.clone(), request.business_name);
    config.sources = request.sources;

    state
        .orchestrator
        .manifest()
        .upsert(config.clone())
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")))?;
    if let Err(err) =
        manifest::record_history(&**state.orchestrator.warehouse(), &config).await
    {
        tracing::warn!(error = %err, "failed to record config history");
    }

    let provisioning_token = Uuid::new_v4();
    let orchestrator = state.orchestrator.clone();
    let slug = request.tenant_slug.clone();
    let days = state.days;
    tokio::spawn(async move {
        if let Err(err) = orchestrator
            .onboard(&slug, days, CancellationToken::new())
            .await
        {
            tracing::error!(tenant = %slug, error = %err, "onboarding failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(OnboardAccepted { provisioning_token }),
    ))
}

async fn readiness(
    State(state): State<ApiState>,
    Path(tenant_slug): Path<String>,
) -> Result<Json<Readiness>, StatusCode> {
    let slug = TenantSlug::new(tenant_slug);
    if state.orchestrator.manifest().get(&slug).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(state.orchestrator.status_board().get(&slug)))
}
