//! Fixed values shared across crates.

/// MIME type of every successful conversion response.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Filename used when the engine does not suggest one.
pub const DEFAULT_OUTPUT_FILENAME: &str = "converted.xlsx";

/// Multipart field that carries the uploaded file, inbound and outbound.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Extensions accepted when `ALLOWED_EXTENSIONS` is not set.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = ["csv", "xls", "xlsx", "ods", "json"];

/// Upper bound on credential lifetime, in seconds.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Declared MIME types that carry no information and always pass validation.
pub const UNDECLARED_MIME_TYPES: [&str; 2] = ["", "application/octet-stream"];

/// Per-extension MIME allow-list.
pub fn allowed_mime_types(extension: &str) -> &'static [&'static str] {
    match extension {
        "csv" => &["text/csv", "application/vnd.ms-excel"],
        "xls" => &["application/vnd.ms-excel"],
        "xlsx" => &[XLSX_CONTENT_TYPE],
        "ods" => &["application/vnd.oasis.opendocument.spreadsheet"],
        "json" => &["application/json", "text/json"],
        _ => &[],
    }
}
