//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; anything that
//! converts into `AppError` renders with the same status, body and logging.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sheetgate_core::{AppError, ErrorMetadata, LogLevel};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Try saving as CSV")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rule: both the trait and `AppError` are foreign to this crate).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        )))
    }
}

/// Message shared by every 413 the gateway produces.
pub fn multipart_error_message(limit: &str) -> String {
    format!(
        "File exceeds {} limit. Try splitting your file or contact support for larger uploads.",
        limit
    )
}

/// Body-limit failures surface here and must stay 413s.
pub fn multipart_error(err: MultipartError, limit: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(multipart_error_message(limit))
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", err.body_text()))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error.detailed_message(), error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let is_production = is_production_env();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let show_details = !is_production && !app_error.is_sensitive();
        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details: show_details.then(|| app_error.detailed_message()),
            error_type: show_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_backend_unavailable_renders_503() {
        let response =
            HttpAppError(AppError::BackendUnavailable("http://a: connection failed".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["code"], "BACKEND_UNAVAILABLE");
        assert_eq!(body["recoverable"], true);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("http://a: connection failed"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response =
            HttpAppError(AppError::Internal("/tmp/sheetgate: disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_anyhow_maps_to_internal() {
        let err: HttpAppError = anyhow::anyhow!("boom").into();
        match err.0 {
            AppError::InternalWithSource { message, .. } => assert_eq!(message, "boom"),
            _ => panic!("Expected InternalWithSource"),
        }
    }
}
