//! Sheetgate Core Library
//!
//! This crate provides the domain model, error taxonomy, configuration, upload
//! validation and engine credentials shared by the gateway, the proxy client
//! and the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod token;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, MimeStrictness};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ConversionOutcome, UploadRequest};
pub use token::{Claims, TokenSigner};
pub use validation::{UploadPolicy, ValidationError};
