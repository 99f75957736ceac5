use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use crm_engine::workflows::campaigns::{
    campaign_router, CampaignRepository, CampaignScheduler, CampaignSender,
};
use crm_engine::workflows::scoring::{
    scoring_router, LeadScoringService, ScoringConfiguration, ScoringRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_crm_routes<R, C, S>(
    scoring: Arc<LeadScoringService<R>>,
    scheduler: Arc<CampaignScheduler<C, S>>,
) -> Router
where
    R: ScoringRepository + 'static,
    C: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    let settings = Router::new()
        .route("/api/v1/scoring/config", get(scoring_config_endpoint::<R>))
        .with_state(scoring.clone());

    scoring_router(scoring)
        .merge(campaign_router(scheduler))
        .merge(settings)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Active scoring rubric, as loaded at startup.
pub(crate) async fn scoring_config_endpoint<R>(
    State(service): State<Arc<LeadScoringService<R>>>,
) -> Json<ScoringConfiguration>
where
    R: ScoringRepository + 'static,
{
    Json(service.policy().configuration().clone())
}
