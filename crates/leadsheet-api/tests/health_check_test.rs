//! Health, readiness and liveness endpoint tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use leadsheet_api::{create_router, AppState};
use leadsheet_core::{LeadIntake, MemoryStore, StoreError, StoreOperation};
use serde_json::Value;
use tower::ServiceExt;

fn app_with(store: &MemoryStore) -> axum::Router {
    let intake = LeadIntake::with_default_table(Arc::new(store.clone()));
    create_router(AppState::new(intake, 1024))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_store_up() {
    let store = MemoryStore::new();

    let (status, body) = get(app_with(&store), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"]["status"], "up");
    assert_eq!(body["checks"]["store"]["backend"], "memory");
    assert!(body["checks"]["store"].get("message").is_none());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_reports_store_down() {
    let store = MemoryStore::recording();
    store
        .inject_failure(StoreOperation::HealthCheck, StoreError::Unavailable("offline".into()))
        .await;

    let (status, body) = get(app_with(&store), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["store"]["status"], "down");
    assert!(body["checks"]["store"]["message"].as_str().unwrap().contains("offline"));
}

#[tokio::test]
async fn readiness_follows_store() {
    let store = MemoryStore::recording();

    let (status, _) = get(app_with(&store), "/ready").await;
    assert_eq!(status, StatusCode::OK);

    store
        .inject_failure(StoreOperation::HealthCheck, StoreError::Unavailable("offline".into()))
        .await;
    let (status, _) = get(app_with(&store), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn liveness_does_not_touch_store() {
    let store = MemoryStore::recording();

    let (status, body) = get(app_with(&store), "/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert!(store.operations().await.is_empty());
}
