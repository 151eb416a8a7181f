use std::path::PathBuf;

/// One accepted inbound file.
///
/// The bytes live on disk at `content_path`; the gateway owns that file for the
/// duration of the request and removes it when the request scope ends.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Sanitised client-supplied filename.
    pub original_name: String,
    pub declared_mime_type: Option<String>,
    /// Lower-cased, without the leading dot.
    pub extension: String,
    pub size_bytes: u64,
    pub content_path: PathBuf,
}

impl UploadRequest {
    /// MIME type sent to the engine: the declared one, or a generic binary type.
    pub fn outbound_mime_type(&self) -> &str {
        match self.declared_mime_type.as_deref() {
            Some(mime) if !mime.trim().is_empty() => mime,
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(mime: Option<&str>) -> UploadRequest {
        UploadRequest {
            original_name: "data.csv".to_string(),
            declared_mime_type: mime.map(str::to_string),
            extension: "csv".to_string(),
            size_bytes: 3,
            content_path: PathBuf::from("/tmp/x.csv"),
        }
    }

    #[test]
    fn test_outbound_mime_type_defaults_to_octet_stream() {
        assert_eq!(upload(None).outbound_mime_type(), "application/octet-stream");
        assert_eq!(upload(Some(" ")).outbound_mime_type(), "application/octet-stream");
        assert_eq!(upload(Some("text/csv")).outbound_mime_type(), "text/csv");
    }
}
