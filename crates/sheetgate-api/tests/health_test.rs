mod helpers;

use helpers::*;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_check() {
    let app = setup_test_app(&[unreachable_url().await]).await;

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_docs_describe_endpoints() {
    let app = setup_test_app(&[unreachable_url().await]).await;

    let response = app.server.get("/").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["service"], "XLSX Conversion Service");
    assert_eq!(body["endpoints"]["/convert"]["method"], "POST");
    assert_eq!(
        body["endpoints"]["/convert"]["request"],
        "multipart/form-data, field name: file"
    );
    assert_eq!(body["endpoints"]["/health"]["method"], "GET");
}

#[tokio::test]
async fn test_ready_reports_first_healthy_engine() {
    let down = unreachable_url().await;
    let engine = spawn_engine(EngineReply::Workbook(FAKE_WORKBOOK)).await;
    let app = setup_test_app(&[down, engine.url.clone()]).await;

    let response = app.server.get("/ready").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["engine"], engine.url.as_str());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_ready_is_503_without_engine() {
    let app = setup_test_app(&[unreachable_url().await, unreachable_url().await]).await;

    let response = app.server.get("/ready").await;

    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body, json!({ "status": "not_ready", "engine": null }));
}

#[tokio::test]
async fn test_wait_for_engine_gives_up_after_timeout() {
    let app = setup_test_app(&[unreachable_url().await]).await;

    let started = std::time::Instant::now();
    let engine = sheetgate_api::setup::server::wait_for_engine(
        &app.state,
        std::time::Duration::from_millis(600),
    )
    .await;

    assert!(engine.is_none());
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn test_wait_for_engine_returns_reachable_engine() {
    let engine = spawn_engine(EngineReply::Workbook(FAKE_WORKBOOK)).await;
    let app = setup_test_app(&[engine.url.clone()]).await;

    let found = sheetgate_api::setup::server::wait_for_engine(
        &app.state,
        std::time::Duration::from_secs(2),
    )
    .await;

    assert_eq!(found, Some(engine.url.clone()));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = setup_test_app(&[unreachable_url().await]).await;

    let response = app
        .server
        .get("/health")
        .add_header("X-Request-ID", "trace-abc-123")
        .await;

    assert_eq!(response.header("x-request-id"), "trace-abc-123");
}
