//! Shared harness for gateway integration tests.
//!
//! Engines are real axum servers on `127.0.0.1:0` that count their calls.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use sheetgate_api::AppState;
use sheetgate_core::constants::XLSX_CONTENT_TYPE;
use sheetgate_core::{Config, TokenSigner};
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret-0123";
pub const FAKE_WORKBOOK: &[u8] = b"PK\x03\x04 converted workbook bytes";

/// What a mock engine answers on `POST /convert`.
#[derive(Clone, Copy)]
pub enum EngineReply {
    Workbook(&'static [u8]),
    Empty,
    Reject(u16, &'static str),
}

pub struct MockEngine {
    pub url: String,
    calls: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Spawn an engine that checks the bearer credential and the `file` part.
pub async fn spawn_engine(reply: EngineReply) -> MockEngine {
    let calls = Arc::new(AtomicUsize::new(0));
    let verifier = TokenSigner::new(TEST_SECRET, "engine", 60);

    let convert = {
        let calls = calls.clone();
        move |headers: HeaderMap, body: Bytes| {
            let calls = calls.clone();
            let verifier = verifier.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);

                let authorized = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(|token| verifier.verify(token).is_ok())
                    .unwrap_or(false);
                if !authorized {
                    return (StatusCode::UNAUTHORIZED, "missing credential").into_response();
                }
                if !String::from_utf8_lossy(&body).contains("name=\"file\"") {
                    return (StatusCode::BAD_REQUEST, "no file part").into_response();
                }

                match reply {
                    EngineReply::Workbook(bytes) => (
                        StatusCode::OK,
                        [
                            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE),
                            (header::CONTENT_DISPOSITION, "attachment; filename=\"sales.xlsx\""),
                        ],
                        bytes,
                    )
                        .into_response(),
                    EngineReply::Empty => StatusCode::OK.into_response(),
                    EngineReply::Reject(status, detail) => (
                        StatusCode::from_u16(status).unwrap(),
                        axum::Json(serde_json::json!({ "error": detail })),
                    )
                        .into_response(),
                }
            }
        }
    };

    let app = Router::new()
        .route("/convert", post(convert))
        .route("/health", get(|| async { axum::Json(serde_json::json!({ "status": "ok" })) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockEngine {
        url: format!("http://{}", addr),
        calls,
    }
}

/// A port that was bound and released, so connections are refused.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    transient_dir: TempDir,
}

impl TestApp {
    /// A valid bearer token for `/convert`.
    pub fn token(&self) -> String {
        self.state.signer.mint_for("integration-client").unwrap()
    }

    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token())
    }

    pub fn transient_dir(&self) -> &Path {
        self.transient_dir.path()
    }

    /// Files left behind in transient storage.
    pub fn transient_files(&self) -> usize {
        std::fs::read_dir(self.transient_dir.path()).unwrap().count()
    }
}

pub async fn setup_test_app(engines: &[String]) -> TestApp {
    setup_test_app_with(engines, |_| {}).await
}

/// Build the full router against `engines` (first one is `ENGINE_URL`).
pub async fn setup_test_app_with(
    engines: &[String],
    configure: impl FnOnce(&mut Config),
) -> TestApp {
    let transient_dir = tempfile::tempdir().expect("Failed to create transient dir");

    let mut config = Config::with_secret(TEST_SECRET);
    config.engine_url = engines.first().cloned().unwrap_or_default();
    config.engine_fallback_urls = engines.iter().skip(1).cloned().collect();
    config.engine_timeout_secs = 2;
    config.transient_dir = transient_dir.path().to_path_buf();
    configure(&mut config);

    let state = sheetgate_api::setup::build_state(&config)
        .await
        .expect("Failed to build state");
    let app = sheetgate_api::setup::routes::setup_routes(&config, state.clone())
        .expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        transient_dir,
    }
}

/// A multipart body with one `file` part.
pub fn file_form(filename: &str, mime_type: &str, contents: impl Into<Vec<u8>>) -> MultipartForm {
    let part = Part::bytes(contents.into())
        .file_name(filename.to_string())
        .mime_type(mime_type.to_string());
    MultipartForm::new().add_part("file", part)
}

pub fn csv_form() -> MultipartForm {
    file_form("sales.csv", "text/csv", "region,total\nnorth,10\nsouth,20\n")
}
