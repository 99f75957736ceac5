use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::workflows::{RepositoryError, TenantId};

use super::delegate::CampaignSender;
use super::domain::{CampaignId, DEFAULT_TIMEZONE};
use super::repository::CampaignRepository;
use super::scheduler::{CampaignScheduler, SchedulerError};

/// Router builder exposing campaign scheduling endpoints.
pub fn campaign_router<R, S>(scheduler: Arc<CampaignScheduler<R, S>>) -> Router
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    Router::new()
        .route(
            "/api/v1/tenants/:tenant_id/campaigns/:campaign_id/schedule",
            post(schedule_handler::<R, S>)
                .put(reschedule_handler::<R, S>)
                .delete(cancel_handler::<R, S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/campaigns/scheduled",
            get(scheduled_handler::<R, S>),
        )
        .route("/api/v1/campaigns/dispatch", post(dispatch_handler::<R, S>))
        .with_state(scheduler)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleRequest {
    pub(crate) scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DispatchQuery {
    #[serde(default)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

impl SchedulerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SchedulerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SchedulerError::NotFound(_) | SchedulerError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            SchedulerError::InvalidTransition(_)
            | SchedulerError::StatusChanged(_)
            | SchedulerError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            SchedulerError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn error_response(error: SchedulerError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (error.status_code(), Json(payload)).into_response()
}

pub(crate) async fn schedule_handler<R, S>(
    State(scheduler): State<Arc<CampaignScheduler<R, S>>>,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    Json(request): Json<ScheduleRequest>,
) -> Response
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    let timezone = request
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    match scheduler.schedule(
        &TenantId(tenant_id),
        &CampaignId(campaign_id),
        request.scheduled_at,
        &timezone,
        Utc::now(),
    ) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reschedule_handler<R, S>(
    State(scheduler): State<Arc<CampaignScheduler<R, S>>>,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    Json(request): Json<ScheduleRequest>,
) -> Response
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    let timezone = request
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    match scheduler.reschedule(
        &TenantId(tenant_id),
        &CampaignId(campaign_id),
        request.scheduled_at,
        &timezone,
        Utc::now(),
    ) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_handler<R, S>(
    State(scheduler): State<Arc<CampaignScheduler<R, S>>>,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> Response
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    match scheduler.cancel(&TenantId(tenant_id), &CampaignId(campaign_id.clone())) {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({ "campaign_id": campaign_id, "status": status })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn scheduled_handler<R, S>(
    State(scheduler): State<Arc<CampaignScheduler<R, S>>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    match scheduler.scheduled_campaigns(&TenantId(tenant_id), Utc::now()) {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dispatch_handler<R, S>(
    State(scheduler): State<Arc<CampaignScheduler<R, S>>>,
    Query(query): Query<DispatchQuery>,
) -> Response
where
    R: CampaignRepository + 'static,
    S: CampaignSender + 'static,
{
    let now = query.as_of.unwrap_or_else(Utc::now);
    match scheduler.process_due_campaigns(now).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}
