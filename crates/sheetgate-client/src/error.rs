use sheetgate_core::AppError;

/// Failures that stop a conversion before any candidate can be tried.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("No conversion endpoints configured")]
    NoCandidates,

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Failed to sign credential: {0}")]
    Credential(String),

    #[error("Failed to read upload {path}: {source}")]
    UploadRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist preferred endpoint: {0}")]
    Preference(#[source] std::io::Error),
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        AppError::Internal(err.to_string())
    }
}
