//! Integration tests for health check and general API functionality.
//!
//! Tests cover:
//! - Health check endpoint
//! - Unknown routes

use axum::http::StatusCode;
use serde_json::Value;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let (status, body) = get(test_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "eventsearch-api");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (status, _) = get(test_app(), "/api/v1/logs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
