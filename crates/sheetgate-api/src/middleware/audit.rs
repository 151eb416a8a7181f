//! Structured audit records under the `audit` tracing target.
//!
//! Caller subjects and filenames are only ever recorded as SHA-256 digests.

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AuthenticationFailure,
    Conversion,
}

/// One record per `/convert` request.
#[derive(Debug, Serialize)]
pub struct ConversionAuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub subject_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub size_bytes: u64,
    pub status_code: u16,
    /// `success`, `backend_error`, `transport_error`, `local_fallback` or `rejected`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub duration_ms: u64,
}

impl ConversionAuditEntry {
    pub fn new(subject: &str) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type: AuditEventType::Conversion,
            request_id: None,
            subject_hash: hash_identifier(subject),
            filename_hash: None,
            extension: None,
            size_bytes: 0,
            status_code: 200,
            outcome: "rejected".to_string(),
            endpoint: None,
            duration_ms: 0,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_upload(mut self, filename: &str, extension: &str, size_bytes: u64) -> Self {
        self.record_upload(filename, extension, size_bytes);
        self
    }

    /// Attach the accepted upload once the multipart body has been read.
    pub fn record_upload(&mut self, filename: &str, extension: &str, size_bytes: u64) {
        self.filename_hash = Some(hash_identifier(filename));
        self.extension = Some(extension.to_string());
        self.size_bytes = size_bytes;
    }

    pub fn with_result(
        mut self,
        status_code: u16,
        outcome: &str,
        endpoint: Option<String>,
        duration_ms: u64,
    ) -> Self {
        self.status_code = status_code;
        self.outcome = outcome.to_string();
        self.endpoint = endpoint;
        self.duration_ms = duration_ms;
        self
    }

    pub fn log(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());

        if self.status_code < 400 {
            tracing::event!(
                target: "audit",
                tracing::Level::INFO,
                audit_entry = %json,
                outcome = %self.outcome,
                status_code = self.status_code,
                "Conversion audit log"
            );
        } else {
            tracing::event!(
                target: "audit",
                tracing::Level::WARN,
                audit_entry = %json,
                outcome = %self.outcome,
                status_code = self.status_code,
                "Conversion audit log - failure"
            );
        }
    }
}

/// Log a rejected bearer credential.
pub fn log_authentication_failure(reason: &str) {
    tracing::event!(
        target: "audit",
        tracing::Level::WARN,
        event_type = ?AuditEventType::AuthenticationFailure,
        reason = %reason,
        "Security audit log - failure"
    );
}

/// Lower-case hex SHA-256 of `value`.
pub fn hash_identifier(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
