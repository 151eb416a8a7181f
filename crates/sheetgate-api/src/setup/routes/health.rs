//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

#[derive(serde::Serialize)]
pub(super) struct ReadinessResponse {
    pub status: &'static str,
    pub engine: Option<String>,
}

/// Liveness of the gateway itself; never touches the engine.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Ready when at least one engine candidate answers `GET /health`.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = match state.engine.resolver().resolve_candidates().await {
        Ok(candidates) => state.engine.first_healthy(&candidates).await,
        Err(e) => {
            tracing::warn!(error = %e, "No engine candidates to probe");
            None
        }
    };

    let (status_code, status) = if engine.is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (status_code, Json(ReadinessResponse { status, engine }))
}
