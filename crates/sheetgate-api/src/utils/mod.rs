pub mod upload;

pub use upload::{attachment_disposition, receive_upload, sanitize_filename, ReceivedUpload};
