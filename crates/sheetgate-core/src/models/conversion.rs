use bytes::Bytes;

use crate::error::AppError;

/// Result of proxying one upload across the candidate engines.
#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    /// An engine answered 2xx with a non-empty body.
    Success {
        payload: Bytes,
        content_type: String,
        suggested_filename: String,
        /// Base URL of the engine that produced the payload.
        endpoint: String,
    },
    /// At least one engine was reached but none produced a usable payload.
    BackendError { status_code: u16, message: String },
    /// No engine could be reached at all.
    TransportError { cause: String },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    /// Short label used in logs and audit records.
    pub fn status_label(&self) -> &'static str {
        match self {
            ConversionOutcome::Success { .. } => "success",
            ConversionOutcome::BackendError { .. } => "backend_error",
            ConversionOutcome::TransportError { .. } => "transport_error",
        }
    }

    /// Error the gateway reports for a failed outcome; `None` on success.
    pub fn to_app_error(&self) -> Option<AppError> {
        match self {
            ConversionOutcome::Success { .. } => None,
            ConversionOutcome::BackendError { message, .. } => {
                Some(AppError::BackendRejected(message.clone()))
            }
            ConversionOutcome::TransportError { cause } => {
                Some(AppError::BackendUnavailable(cause.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorMetadata;

    #[test]
    fn test_failures_map_to_gateway_errors() {
        let rejected = ConversionOutcome::BackendError {
            status_code: 422,
            message: "http://a: bad sheet".to_string(),
        };
        assert_eq!(rejected.to_app_error().unwrap().http_status_code(), 400);

        let unreachable = ConversionOutcome::TransportError {
            cause: "http://a: connection refused".to_string(),
        };
        assert_eq!(unreachable.to_app_error().unwrap().http_status_code(), 503);
        assert_eq!(unreachable.status_label(), "transport_error");
    }

    #[test]
    fn test_success_has_no_error() {
        let ok = ConversionOutcome::Success {
            payload: Bytes::from_static(b"PK"),
            content_type: "x".to_string(),
            suggested_filename: "converted.xlsx".to_string(),
            endpoint: "http://a".to_string(),
        };
        assert!(ok.is_success());
        assert!(ok.to_app_error().is_none());
    }
}
