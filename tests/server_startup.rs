//! Server Startup Tests
//!
//! HTTP surface of the relay: health check and the rejections served by
//! `/realtime-chat` before any upgrade happens.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use common::{TEST_API_KEY, test_config};
use voice_bid_relay::core::realtime::openai::OPENAI_REALTIME_URL;
use voice_bid_relay::state::AppState;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn upgrade_request() -> Request<Body> {
    Request::builder()
        .uri("/realtime-chat")
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = voice_bid_relay::app(AppState::new(test_config(OPENAI_REALTIME_URL, None)));

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"status":"OK"}"#);
}

#[tokio::test]
async fn test_missing_credential_rejected_before_upgrade() {
    let app = voice_bid_relay::app(AppState::new(test_config(OPENAI_REALTIME_URL, None)));

    let response = app.oneshot(upgrade_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(response).await,
        r#"{"error":"OPENAI_API_KEY not configured"}"#
    );
}

#[tokio::test]
async fn test_missing_credential_wins_over_plain_get() {
    let app = voice_bid_relay::app(AppState::new(test_config(OPENAI_REALTIME_URL, None)));

    let request = Request::builder()
        .uri("/realtime-chat")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_plain_get_requires_upgrade() {
    let app = voice_bid_relay::app(AppState::new(test_config(
        OPENAI_REALTIME_URL,
        Some(TEST_API_KEY),
    )));

    let request = Request::builder()
        .uri("/realtime-chat")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    assert_eq!(body_string(response).await, "Expected websocket");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = voice_bid_relay::app(AppState::new(test_config(OPENAI_REALTIME_URL, None)));

    let request = Request::builder().uri("/realtime").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
