use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Extension, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use sheetgate_core::constants::{DEFAULT_OUTPUT_FILENAME, XLSX_CONTENT_TYPE};
use sheetgate_core::validation::format_size_limit;
use sheetgate_core::{AppError, ConversionOutcome, ErrorMetadata};

use crate::auth::AuthenticatedCaller;
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::error::{multipart_error_message, HttpAppError};
use crate::local_convert::convert_json_to_xlsx;
use crate::middleware::audit::ConversionAuditEntry;
use crate::middleware::request_id::RequestId;
use crate::state::AppState;
use crate::utils::{attachment_disposition, receive_upload, ReceivedUpload};

/// How a successful response was produced.
struct Converted {
    response: Response,
    outcome: &'static str,
    endpoint: Option<String>,
}

/// `POST /convert`: validate the upload, proxy it to the engine and return
/// the workbook as an attachment.
pub async fn convert_file(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedCaller>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let started = Instant::now();
    let mut audit = ConversionAuditEntry::new(&caller.subject)
        .with_request_id(request_id.map(|Extension(id)| id.0));

    let result = run_conversion(&state, &headers, multipart, &mut audit).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(converted) => {
            audit
                .with_result(
                    converted.response.status().as_u16(),
                    converted.outcome,
                    converted.endpoint,
                    duration_ms,
                )
                .log();
            Ok(converted.response)
        }
        Err((error, outcome)) => {
            audit
                .with_result(error.http_status_code(), outcome, None, duration_ms)
                .log();
            Err(error.into())
        }
    }
}

async fn run_conversion(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
    audit: &mut ConversionAuditEntry,
) -> Result<Converted, (AppError, &'static str)> {
    reject_declared_oversize(state, headers).map_err(|e| (e, "rejected"))?;

    let multipart = multipart.map_err(|rejection| (HttpAppError::from(rejection).0, "rejected"))?;

    let ReceivedUpload {
        request: upload,
        mut artifact,
    } = receive_upload(multipart, &state.policy, &state.transient)
        .await
        .map_err(|e| (e, "rejected"))?;

    audit.record_upload(&upload.original_name, &upload.extension, upload.size_bytes);

    tracing::info!(
        filename = %upload.original_name,
        extension = %upload.extension,
        size_bytes = upload.size_bytes,
        "Upload accepted, forwarding to conversion engine"
    );

    let outcome = match state.engine.convert_resolved(&upload).await {
        Ok(outcome) => outcome,
        Err(e) => {
            artifact.cleanup().await;
            return Err((e.into(), "rejected"));
        }
    };

    let label = outcome.status_label();
    let result = match outcome {
        ConversionOutcome::Success {
            payload,
            content_type,
            suggested_filename,
            endpoint,
        } => {
            if content_type != XLSX_CONTENT_TYPE {
                tracing::debug!(
                    content_type = %content_type,
                    "Engine content type overridden with XLSX"
                );
            }
            workbook_response(&suggested_filename, payload.len() as u64, Body::from(payload))
                .map(|response| Converted {
                    response,
                    outcome: label,
                    endpoint: Some(endpoint),
                })
                .map_err(|e| (e, label))
        }
        ConversionOutcome::TransportError { .. }
            if state.config.local_json_fallback && upload.extension == "json" =>
        {
            tracing::warn!("No conversion engine reachable, converting JSON locally");
            convert_locally(state, &upload.content_path)
                .await
                .map(|response| Converted {
                    response,
                    outcome: "local_fallback",
                    endpoint: None,
                })
                .map_err(|e| (e, "local_fallback"))
        }
        failed => {
            let error = failed
                .to_app_error()
                .unwrap_or_else(|| AppError::Internal("Unexpected conversion outcome".to_string()));
            Err((error, label))
        }
    };

    artifact.cleanup().await;
    result
}

/// Transport-level 413 from a declared `Content-Length`, before any body is read.
fn reject_declared_oversize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let limit = state.policy.max_size_bytes() + MULTIPART_OVERHEAD_BYTES as u64;
    match declared {
        Some(length) if length > limit => {
            tracing::debug!(content_length = length, limit, "Declared body exceeds upload ceiling");
            Err(AppError::PayloadTooLarge(multipart_error_message(
                &format_size_limit(state.policy.max_size_bytes()),
            )))
        }
        _ => Ok(()),
    }
}

async fn convert_locally(
    state: &AppState,
    input: &std::path::Path,
) -> Result<Response, AppError> {
    let json = tokio::fs::read(input).await?;

    let (output, file) = state.transient.create("xlsx").await?;
    drop(file);

    let output_path = output.path().to_path_buf();
    tokio::task::spawn_blocking(move || convert_json_to_xlsx(&json, &output_path))
        .await
        .map_err(|e| AppError::Internal(format!("Local conversion task failed: {}", e)))??;

    let length = tokio::fs::metadata(output.path()).await?.len();
    let stream = output.into_stream().await?;

    workbook_response(DEFAULT_OUTPUT_FILENAME, length, Body::from_stream(stream))
}

fn workbook_response(filename: &str, length: u64, body: Body) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, attachment_disposition(filename))
        .header(header::CONTENT_LENGTH, length)
        .body(body)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            AppError::Internal(e.to_string())
        })
}
