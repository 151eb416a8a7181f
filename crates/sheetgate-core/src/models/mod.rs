pub mod conversion;
pub mod upload;

pub use conversion::ConversionOutcome;
pub use upload::UploadRequest;
