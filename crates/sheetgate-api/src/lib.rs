//! Sheetgate API Library
//!
//! HTTP front door for spreadsheet conversion: authentication, upload
//! validation, transient storage, proxying to the engine and streaming the
//! converted workbook back.

pub mod constants;
mod handlers;
pub mod local_convert;
mod middleware;
pub mod setup;
pub mod telemetry;
pub mod transient;
pub mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
