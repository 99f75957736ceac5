use super::common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::scoring::scoring_router;

fn router(repository: MemoryRepository) -> axum::Router {
    let (service, _) = build_service(repository);
    scoring_router(Arc::new(service))
}

#[tokio::test]
async fn score_route_returns_the_record() {
    let repository = MemoryRepository::default()
        .with_contact(coach("c-1"))
        .with_event(event("c-1", "course.purchased", 14));

    let response = router(repository)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/tenants/tenant-kliq/contacts/c-1/score?as_of=2025-10-01T09:00:00Z")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["fit_score"], json!(70.0));
    assert_eq!(body["combined_score"], json!(40.0));
    assert_eq!(body["fit_tier"], json!("A"));
}

#[tokio::test]
async fn fetch_route_returns_not_found_before_scoring() {
    let response = router(MemoryRepository::default().with_contact(coach("c-1")))
        .oneshot(
            Request::builder()
                .uri("/api/v1/tenants/tenant-kliq/contacts/c-1/score")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("no score recorded"));
}

#[tokio::test]
async fn recompute_route_reports_failures_alongside_scores() {
    let response = router(MemoryRepository::default().with_contact(coach("c-1")))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/tenants/tenant-kliq/scores/recompute")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "contact_ids": ["c-1", "c-missing"],
                        "as_of": "2025-10-01T09:00:00Z"
                    })
                    .to_string(),
                ))
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["scored"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["failures"][0]["contact_id"], json!("c-missing"));
}

#[tokio::test]
async fn leads_route_honours_limit() {
    let repository = MemoryRepository::default()
        .with_contact(coach("c-1"))
        .with_contact(coach("c-2"));
    let (service, _) = build_service(repository);
    let service = Arc::new(service);
    for id in ["c-1", "c-2"] {
        service
            .score_contact(
                &tenant(),
                &crate::workflows::scoring::ContactId(id.to_string()),
                as_of(),
            )
            .expect("scores");
    }

    let response = scoring_router(service)
        .oneshot(
            Request::builder()
                .uri("/api/v1/tenants/tenant-kliq/leads?limit=1")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}
