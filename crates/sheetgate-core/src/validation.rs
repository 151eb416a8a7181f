//! Upload validation rules.
//!
//! Checks run on the multipart field headers (extension, declared MIME type)
//! before any byte is stored, and on the byte count while the body streams in.

use std::path::Path;

use crate::config::{Config, MimeStrictness};
use crate::constants::{allowed_mime_types, UNDECLARED_MIME_TYPES};
use crate::error::AppError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File exceeds {limit} limit. Try splitting your file or contact support for larger uploads.")]
    FileTooLarge { limit: String },

    #[error("Only {allowed} files are allowed (got '{extension}'). Try saving as CSV.")]
    InvalidExtension { extension: String, allowed: String },

    #[error("Invalid MIME type: {content_type} for extension .{extension}")]
    InvalidContentType {
        content_type: String,
        extension: String,
    },

    #[error("Uploaded file is empty. Please upload a file with content.")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            _ => AppError::InvalidInput(err.to_string()),
        }
    }
}

/// Result of a MIME check that did not reject the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeCheck {
    Match,
    /// MIME type absent or generic.
    Undeclared,
    /// Mismatch tolerated because strictness is permissive.
    Mismatch(String),
}

/// Validation rules for one gateway instance.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_size_bytes: u64,
    allowed_extensions: Vec<String>,
    strictness: MimeStrictness,
}

impl UploadPolicy {
    pub fn new(
        max_size_bytes: u64,
        allowed_extensions: Vec<String>,
        strictness: MimeStrictness,
    ) -> Self {
        Self {
            max_size_bytes,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .collect(),
            strictness,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_upload_size_bytes as u64,
            config.allowed_extensions.clone(),
            config.mime_strictness,
        )
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Validate file extension, returning it lower-cased and without the dot.
    pub fn validate_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = extension_of(filename).unwrap_or_default();

        if extension.is_empty() || !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.join(", "),
            });
        }

        Ok(extension)
    }

    /// Check the declared MIME type against the per-extension allow-list.
    ///
    /// Extensions without a known MIME list are not constrained.
    pub fn validate_content_type(
        &self,
        extension: &str,
        declared: Option<&str>,
    ) -> Result<MimeCheck, ValidationError> {
        let normalized = declared
            .map(|ct| normalize_mime_type(ct).to_lowercase())
            .unwrap_or_default();

        if UNDECLARED_MIME_TYPES.contains(&normalized.as_str()) {
            return Ok(MimeCheck::Undeclared);
        }

        let allowed = allowed_mime_types(extension);
        if allowed.is_empty() || allowed.contains(&normalized.as_str()) {
            return Ok(MimeCheck::Match);
        }

        match self.strictness {
            MimeStrictness::Strict => Err(ValidationError::InvalidContentType {
                content_type: normalized,
                extension: extension.to_string(),
            }),
            MimeStrictness::Permissive => Ok(MimeCheck::Mismatch(normalized)),
        }
    }

    /// Validate a running or final byte count against the ceiling.
    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_size_bytes {
            return Err(ValidationError::FileTooLarge {
                limit: format_size_limit(self.max_size_bytes),
            });
        }
        Ok(())
    }

    /// Reject zero-byte uploads once the body has been fully read.
    pub fn validate_not_empty(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        Ok(())
    }
}

/// Lower-cased extension without the dot, if the filename has one.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Human-readable ceiling for error messages: `50MB`, `1.5MB`, `512KB`.
pub fn format_size_limit(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Normalize MIME type by stripping parameters (e.g. "text/csv; charset=utf-8" -> "text/csv").
pub fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
}
