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

use super::domain::ContactId;
use super::repository::ScoringRepository;
use super::service::{LeadScoringService, ScoringServiceError, DEFAULT_TOP_LEADS};

/// Router builder exposing scoring endpoints.
pub fn scoring_router<R>(service: Arc<LeadScoringService<R>>) -> Router
where
    R: ScoringRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/tenants/:tenant_id/contacts/:contact_id/score",
            post(score_handler::<R>).get(fetch_score_handler::<R>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/contacts/:contact_id/score/explain",
            get(explain_handler::<R>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/scores/recompute",
            post(recompute_handler::<R>),
        )
        .route("/api/v1/tenants/:tenant_id/leads", get(top_leads_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AsOfQuery {
    #[serde(default)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LeadsQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecomputeRequest {
    pub(crate) contact_ids: Vec<String>,
    #[serde(default)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

impl ScoringServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScoringServiceError::ContactNotFound(_)
            | ScoringServiceError::ScoreNotFound(_)
            | ScoringServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ScoringServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            ScoringServiceError::Configuration(_) | ScoringServiceError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn error_response(error: ScoringServiceError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (error.status_code(), Json(payload)).into_response()
}

pub(crate) async fn score_handler<R>(
    State(service): State<Arc<LeadScoringService<R>>>,
    Path((tenant_id, contact_id)): Path<(String, String)>,
    Query(query): Query<AsOfQuery>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    let as_of = query.as_of.unwrap_or_else(Utc::now);
    match service.score_contact(&TenantId(tenant_id), &ContactId(contact_id), as_of) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fetch_score_handler<R>(
    State(service): State<Arc<LeadScoringService<R>>>,
    Path((tenant_id, contact_id)): Path<(String, String)>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.score_for(&TenantId(tenant_id), &ContactId(contact_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn explain_handler<R>(
    State(service): State<Arc<LeadScoringService<R>>>,
    Path((tenant_id, contact_id)): Path<(String, String)>,
    Query(query): Query<AsOfQuery>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    let as_of = query.as_of.unwrap_or_else(Utc::now);
    match service.explain(&TenantId(tenant_id), &ContactId(contact_id), as_of) {
        Ok(breakdown) => (StatusCode::OK, Json(breakdown)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recompute_handler<R>(
    State(service): State<Arc<LeadScoringService<R>>>,
    Path(tenant_id): Path<String>,
    Json(request): Json<RecomputeRequest>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    let as_of = request.as_of.unwrap_or_else(Utc::now);
    let contact_ids: Vec<ContactId> = request.contact_ids.into_iter().map(ContactId).collect();
    let report = service.score_batch(&TenantId(tenant_id), &contact_ids, as_of);
    (StatusCode::OK, Json(report)).into_response()
}

pub(crate) async fn top_leads_handler<R>(
    State(service): State<Arc<LeadScoringService<R>>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<LeadsQuery>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LEADS);
    match service.top_leads(&TenantId(tenant_id), limit) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(error) => error_response(error),
    }
}
