mod helpers;

use helpers::*;
use serde_json::Value;

#[tokio::test]
async fn test_missing_authorization_is_401() {
    let engine = spawn_engine(EngineReply::Workbook(FAKE_WORKBOOK)).await;
    let app = setup_test_app(&[engine.url.clone()]).await;

    let response = app.server.post("/convert").multipart(csv_form()).await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(
        body["error"],
        "Unauthorized: missing or invalid Authorization header"
    );
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_401() {
    let engine = spawn_engine(EngineReply::Workbook(FAKE_WORKBOOK)).await;
    let app = setup_test_app(&[engine.url.clone()]).await;

    let response = app
        .server
        .post("/convert")
        .add_header("Authorization", "Basic dXNlcjpwYXNz")
        .multipart(csv_form())
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_401() {
    let engine = spawn_engine(EngineReply::Workbook(FAKE_WORKBOOK)).await;
    let app = setup_test_app(&[engine.url.clone()]).await;

    let forged = sheetgate_core::TokenSigner::new("some-other-secret-value", "mallory", 60)
        .mint()
        .unwrap();

    let response = app
        .server
        .post("/convert")
        .add_header("Authorization", format!("Bearer {}", forged))
        .multipart(csv_form())
        .await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"], "Unauthorized: invalid token");
    assert_eq!(engine.calls(), 0);
    assert_eq!(app.transient_files(), 0);
}

#[tokio::test]
async fn test_expired_token_is_401() {
    let engine = spawn_engine(EngineReply::Workbook(FAKE_WORKBOOK)).await;
    let app = setup_test_app(&[engine.url.clone()]).await;

    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({ "sub": "client", "iat": now - 120, "exp": now - 60 });
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();

    let response = app
        .server
        .post("/convert")
        .add_header("Authorization", format!("Bearer {}", expired))
        .multipart(csv_form())
        .await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"], "Unauthorized: token has expired");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let app = setup_test_app(&[unreachable_url().await]).await;

    assert_eq!(app.server.get("/health").await.status_code(), 200);
    assert_eq!(app.server.get("/").await.status_code(), 200);
}
