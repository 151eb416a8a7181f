//! Multipart upload intake.
//!
//! The `file` part is validated from its headers first, then streamed to a
//! transient artifact while its size is counted, so an invalid or oversized
//! upload never reaches the engine.

use axum::extract::Multipart;
use sheetgate_core::constants::UPLOAD_FIELD_NAME;
use sheetgate_core::validation::{format_size_limit, MimeCheck};
use sheetgate_core::{AppError, UploadPolicy, UploadRequest};
use tokio::io::AsyncWriteExt;

use crate::error::multipart_error;
use crate::transient::{TransientArtifact, TransientStore};

/// An accepted upload and the artifact holding its bytes.
#[derive(Debug)]
pub struct ReceivedUpload {
    pub request: UploadRequest,
    pub artifact: TransientArtifact,
}

/// Read the single `file` part of `multipart` into `store`.
///
/// Other fields are skipped. On any error the partial artifact is removed.
pub async fn receive_upload(
    mut multipart: Multipart,
    policy: &UploadPolicy,
    store: &TransientStore,
) -> Result<ReceivedUpload, AppError> {
    let limit = format_size_limit(policy.max_size_bytes());
    let mut received: Option<ReceivedUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(received).await;
                return Err(multipart_error(e, &limit));
            }
        };

        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        if received.is_some() {
            discard(received).await;
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let original_name = sanitize_filename(field.file_name().unwrap_or(""))?;
        let declared_mime_type = field.content_type().map(|s| s.to_string());

        let extension = policy.validate_extension(&original_name)?;
        match policy.validate_content_type(&extension, declared_mime_type.as_deref())? {
            MimeCheck::Mismatch(content_type) => tracing::warn!(
                content_type = %content_type,
                extension = %extension,
                "MIME type does not match extension, continuing"
            ),
            MimeCheck::Match | MimeCheck::Undeclared => {}
        }

        let (mut artifact, mut file) = store.create(&extension).await?;
        let mut field = field;
        let mut size_bytes: u64 = 0;

        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    artifact.cleanup().await;
                    return Err(multipart_error(e, &limit));
                }
            };

            size_bytes += chunk.len() as u64;
            if let Err(e) = policy.validate_size(size_bytes) {
                drop(file);
                artifact.cleanup().await;
                return Err(e.into());
            }

            if let Err(e) = file.write_all(&chunk).await {
                artifact.cleanup().await;
                return Err(AppError::Internal(format!("Failed to store upload: {}", e)));
            }
        }

        if let Err(e) = file.flush().await {
            artifact.cleanup().await;
            return Err(AppError::Internal(format!("Failed to store upload: {}", e)));
        }
        drop(file);

        received = Some(ReceivedUpload {
            request: UploadRequest {
                original_name,
                declared_mime_type,
                extension,
                size_bytes,
                content_path: artifact.path().to_path_buf(),
            },
            artifact,
        });
    }

    let mut received = received.ok_or_else(|| {
        AppError::InvalidInput("No file part in request. Please upload a file.".to_string())
    })?;

    if let Err(e) = policy.validate_not_empty(received.request.size_bytes) {
        received.artifact.cleanup().await;
        return Err(e.into());
    }

    Ok(received)
}

async fn discard(received: Option<ReceivedUpload>) {
    if let Some(mut upload) = received {
        upload.artifact.cleanup().await;
    }
}

/// Sanitize filename to prevent path traversal and invalid characters.
/// Path components are stripped; a bare `.` or `..` is rejected.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    if filename_only == "." || filename_only == ".." {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    // Keep the extension when truncating.
    let chars: Vec<char> = filename_only.chars().collect();
    let kept: Vec<char> = if chars.len() > MAX_FILENAME_LENGTH {
        let ext_start = filename_only
            .rfind('.')
            .map(|i| filename_only[..i].chars().count())
            .unwrap_or(chars.len());
        let ext: Vec<char> = chars[ext_start..].to_vec();
        let stem_len = MAX_FILENAME_LENGTH.saturating_sub(ext.len());
        chars[..stem_len.min(ext_start)]
            .iter()
            .copied()
            .chain(ext)
            .take(MAX_FILENAME_LENGTH)
            .collect()
    } else {
        chars
    };

    let sanitized: String = kept
        .into_iter()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    Ok(sanitized)
}

/// Quote-safe value for `Content-Disposition: attachment; filename="..."`.
pub fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim();
    let safe = if safe.is_empty() { "converted.xlsx" } else { safe };
    format!("attachment; filename=\"{}\"", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_rejects_path_traversal() {
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename(".").is_err());
        assert!(sanitize_filename("uploads/..").is_err());
        assert!(sanitize_filename("C:\\data\\..").is_err());
    }

    #[test]
    fn sanitize_filename_allows_dots_inside_the_name() {
        assert_eq!(
            sanitize_filename("Q1..Q2 sales.csv").unwrap(),
            "Q1..Q2 sales.csv"
        );
        assert_eq!(sanitize_filename("report..csv").unwrap(), "report..csv");
        assert_eq!(sanitize_filename("../Q1..Q2.csv").unwrap(), "Q1..Q2.csv");
    }

    #[test]
    fn sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/data.csv").unwrap(), "data.csv");
        assert_eq!(sanitize_filename("C:\\Users\\me\\book.xls").unwrap(), "book.xls");
    }

    #[test]
    fn sanitize_filename_accepts_valid_names() {
        assert_eq!(sanitize_filename("sales.csv").unwrap(), "sales.csv");
        assert_eq!(sanitize_filename("my-file_1.xlsx").unwrap(), "my-file_1.xlsx");
        assert_eq!(sanitize_filename("Q1 report.ods").unwrap(), "Q1 report.ods");
    }

    #[test]
    fn sanitize_filename_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("a\"b;c.csv").unwrap(), "a_b_c.csv");
    }

    #[test]
    fn sanitize_filename_keeps_extension_when_truncating() {
        let long = format!("{}.json", "x".repeat(400));
        let sanitized = sanitize_filename(&long).unwrap();
        assert_eq!(sanitized.chars().count(), 255);
        assert!(sanitized.ends_with(".json"));
    }

    #[test]
    fn attachment_disposition_is_quote_safe() {
        assert_eq!(
            attachment_disposition("report.xlsx"),
            "attachment; filename=\"report.xlsx\""
        );
        assert_eq!(
            attachment_disposition("é\"x.xlsx"),
            "attachment; filename=\"__x.xlsx\""
        );
        assert_eq!(
            attachment_disposition(""),
            "attachment; filename=\"converted.xlsx\""
        );
    }
}
