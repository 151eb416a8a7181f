//! Failover delivery of one upload to the conversion engine.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use sheetgate_core::constants::{DEFAULT_OUTPUT_FILENAME, UPLOAD_FIELD_NAME, XLSX_CONTENT_TYPE};
use sheetgate_core::{ConversionOutcome, TokenSigner, UploadRequest};
use tokio_util::io::ReaderStream;

use crate::error::ClientError;
use crate::resolver::EndpointResolver;

const MAX_ERROR_DETAIL_LEN: usize = 500;

/// Why one candidate did not produce a payload.
#[derive(Debug)]
enum AttemptFailure {
    /// Connection refused, DNS failure, timeout.
    Transport(String),
    /// The engine answered but with an error status or an empty body.
    Rejected { status: u16, message: String },
}

impl AttemptFailure {
    fn reason(&self) -> String {
        match self {
            AttemptFailure::Transport(msg) => msg.clone(),
            AttemptFailure::Rejected { status, message } => {
                format!("status {}: {}", status, message)
            }
        }
    }
}

struct AttemptSuccess {
    payload: Bytes,
    content_type: String,
    suggested_filename: String,
}

/// HTTP client for the conversion engine with sequential failover.
#[derive(Clone, Debug)]
pub struct ConversionClient {
    client: Client,
    resolver: Arc<EndpointResolver>,
    signer: TokenSigner,
    convert_path: String,
}

impl ConversionClient {
    pub fn new(
        resolver: Arc<EndpointResolver>,
        signer: TokenSigner,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::ClientBuild)?;

        Ok(Self {
            client,
            resolver,
            signer,
            convert_path: "/convert".to_string(),
        })
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Resolve candidates, then convert.
    pub async fn convert_resolved(
        &self,
        upload: &UploadRequest,
    ) -> Result<ConversionOutcome, ClientError> {
        let candidates = self.resolver.resolve_candidates().await?;
        self.convert(upload, &candidates).await
    }

    /// Try each candidate in order; the first non-empty 2xx wins.
    ///
    /// Attempts never overlap and a candidate is never retried. When every
    /// candidate fails the outcome lists each `<url>: <reason>`.
    pub async fn convert(
        &self,
        upload: &UploadRequest,
        candidates: &[String],
    ) -> Result<ConversionOutcome, ClientError> {
        if candidates.is_empty() {
            return Err(ClientError::NoCandidates);
        }

        let mut failures: Vec<(String, AttemptFailure)> = Vec::with_capacity(candidates.len());

        for (index, base_url) in candidates.iter().enumerate() {
            tracing::debug!(
                endpoint = %base_url,
                attempt = index + 1,
                of = candidates.len(),
                "Trying conversion endpoint"
            );

            match self.attempt(base_url, upload).await? {
                Ok(success) => {
                    self.resolver.record_success(base_url).await;
                    tracing::info!(
                        endpoint = %base_url,
                        attempts = index + 1,
                        bytes = success.payload.len(),
                        "Conversion succeeded"
                    );
                    return Ok(ConversionOutcome::Success {
                        payload: success.payload,
                        content_type: success.content_type,
                        suggested_filename: success.suggested_filename,
                        endpoint: base_url.clone(),
                    });
                }
                Err(failure) => {
                    tracing::warn!(
                        endpoint = %base_url,
                        reason = %failure.reason(),
                        "Conversion attempt failed"
                    );
                    failures.push((base_url.clone(), failure));
                }
            }
        }

        Ok(aggregate_failures(failures))
    }

    /// One delivery attempt. The outer error is a local failure that stops the
    /// whole conversion; the inner one moves on to the next candidate.
    async fn attempt(
        &self,
        base_url: &str,
        upload: &UploadRequest,
    ) -> Result<Result<AttemptSuccess, AttemptFailure>, ClientError> {
        let token = self
            .signer
            .mint()
            .map_err(|e| ClientError::Credential(e.to_string()))?;
        let form = self.build_form(upload).await?;
        let url = format!("{}{}", base_url, self.convert_path);

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Err(AttemptFailure::Transport(describe_transport_error(&e)))),
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Ok(Err(AttemptFailure::Rejected {
                status: status.as_u16(),
                message: error_detail(status, &error_text),
            }));
        }

        let payload = match response.bytes().await {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(Err(AttemptFailure::Transport(format!(
                    "failed to read response body: {}",
                    describe_transport_error(&e)
                ))))
            }
        };

        if payload.is_empty() {
            return Ok(Err(AttemptFailure::Rejected {
                status: status.as_u16(),
                message: "engine returned an empty payload".to_string(),
            }));
        }

        let content_type = match content_type {
            Some(ct) if ct.starts_with(XLSX_CONTENT_TYPE) => XLSX_CONTENT_TYPE.to_string(),
            Some(ct) => {
                tracing::warn!(
                    endpoint = %base_url,
                    content_type = %ct,
                    "Unexpected content type from engine, treating payload as XLSX"
                );
                XLSX_CONTENT_TYPE.to_string()
            }
            None => XLSX_CONTENT_TYPE.to_string(),
        };

        let suggested_filename = disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string());

        Ok(Ok(AttemptSuccess {
            payload,
            content_type,
            suggested_filename,
        }))
    }

    /// Multipart body streamed from the upload on disk, re-opened per attempt.
    async fn build_form(&self, upload: &UploadRequest) -> Result<Form, ClientError> {
        let part = match file_part(upload).await?.mime_str(upload.outbound_mime_type()) {
            Ok(part) => part,
            Err(e) => {
                tracing::debug!(error = %e, "Declared MIME type not usable, sending without it");
                file_part(upload).await?
            }
        };

        Ok(Form::new().part(UPLOAD_FIELD_NAME, part))
    }

    /// `GET <base>/health` answered with 2xx within the timeout.
    pub async fn probe(&self, base_url: &str) -> bool {
        let url = format!("{}/health", base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(endpoint = %base_url, error = %e, "Health probe failed");
                false
            }
        }
    }

    /// First candidate whose health probe succeeds, probing sequentially.
    pub async fn first_healthy(&self, candidates: &[String]) -> Option<String> {
        for candidate in candidates {
            if self.probe(candidate).await {
                return Some(candidate.clone());
            }
        }
        None
    }
}

async fn file_part(upload: &UploadRequest) -> Result<Part, ClientError> {
    let file = tokio::fs::File::open(&upload.content_path)
        .await
        .map_err(|e| ClientError::UploadRead {
            path: upload.content_path.display().to_string(),
            source: e,
        })?;

    Ok(Part::stream_with_length(
        reqwest::Body::wrap_stream(ReaderStream::new(file)),
        upload.size_bytes,
    )
    .file_name(upload.original_name.clone()))
}

/// A single failed engine makes the whole run a backend error; only when no
/// engine answered at all is it a transport error.
fn aggregate_failures(failures: Vec<(String, AttemptFailure)>) -> ConversionOutcome {
    let summary = failures
        .iter()
        .map(|(url, failure)| format!("{}: {}", url, failure.reason()))
        .collect::<Vec<_>>()
        .join("; ");

    let last_rejected_status = failures.iter().rev().find_map(|(_, failure)| match failure {
        AttemptFailure::Rejected { status, .. } => Some(*status),
        AttemptFailure::Transport(_) => None,
    });

    match last_rejected_status {
        Some(status_code) => ConversionOutcome::BackendError {
            status_code,
            message: format!("All conversion endpoints failed. Errors: {}", summary),
        },
        None => ConversionOutcome::TransportError {
            cause: format!("All conversion endpoints failed. Errors: {}", summary),
        },
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    }
}

/// Prefer the `error`/`detail` field of a JSON body, else the trimmed text.
fn error_detail(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "detail", "message"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        });

    let detail = from_json.unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string();
    }

    detail.chars().take(MAX_ERROR_DETAIL_LEN).collect()
}

/// Extract a bare filename from a Content-Disposition header value.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(value.trim().trim_matches('"').to_string()),
            "filename*" => {
                // RFC 5987: charset'lang'value; only unescaped ASCII is kept.
                let value = value.trim();
                let raw = value.rsplit('\'').next().unwrap_or(value);
                if !raw.contains('%') {
                    extended = Some(raw.to_string());
                }
            }
            _ => {}
        }
    }

    let name = extended.or(plain)?;
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}
