//! Helpers for the `sheetgate` command-line client.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use sheetgate_core::constants::{allowed_mime_types, DEFAULT_ALLOWED_EXTENSIONS};
use sheetgate_core::{MimeStrictness, UploadPolicy, UploadRequest};

/// Gateway tried last when nothing else is configured.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:4000";

/// Result of `sheetgate convert`, printed as JSON.
#[derive(Debug, Serialize)]
pub struct ConvertSummary {
    pub input: String,
    pub output: String,
    pub gateway: String,
    pub bytes: usize,
    pub suggested_filename: String,
}

/// Where the last working gateway is remembered.
///
/// `SHEETGATE_PREFERENCE_FILE` wins; otherwise `$HOME/.cache/sheetgate/preferred-gateway`,
/// falling back to the system temp directory when there is no home.
pub fn preference_path(override_path: Option<&str>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".cache"))
        .unwrap_or_else(std::env::temp_dir)
        .join("sheetgate")
        .join("preferred-gateway")
}

/// Configured gateways in order: `--gateway` flags, then the comma-separated
/// env list, then the local default. Duplicates are removed by the resolver.
pub fn gateway_candidates(flags: &[String], env_list: Option<&str>) -> Vec<String> {
    flags
        .iter()
        .map(|s| s.trim().to_string())
        .chain(
            env_list
                .unwrap_or("")
                .split(',')
                .map(|s| s.trim().to_string()),
        )
        .chain(std::iter::once(DEFAULT_GATEWAY_URL.to_string()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// `<input stem>.xlsx` next to the input, or `<stem>-converted.xlsx` when the
/// input already is that file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "converted".to_string());

    let input_is_xlsx = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if input_is_xlsx {
        input.with_file_name(format!("{}-converted.xlsx", stem))
    } else {
        input.with_file_name(format!("{}.xlsx", stem))
    }
}

/// Describe a local file as an upload, rejecting extensions the gateway would refuse.
pub fn upload_from_path(path: &Path) -> anyhow::Result<UploadRequest> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }

    let original_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Input path has no file name")?;

    let policy = UploadPolicy::new(
        u64::MAX,
        DEFAULT_ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        MimeStrictness::Strict,
    );
    let extension = policy.validate_extension(&original_name)?;
    policy.validate_not_empty(metadata.len())?;

    Ok(UploadRequest {
        declared_mime_type: allowed_mime_types(&extension).first().map(|m| m.to_string()),
        original_name,
        extension,
        size_bytes: metadata.len(),
        content_path: path.to_path_buf(),
    })
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_candidates_keep_flag_then_env_then_default_order() {
        let flags = vec!["http://a:4000".to_string()];
        let candidates = gateway_candidates(&flags, Some("http://b:4000, ,http://c:4000"));
        assert_eq!(
            candidates,
            vec![
                "http://a:4000".to_string(),
                "http://b:4000".to_string(),
                "http://c:4000".to_string(),
                DEFAULT_GATEWAY_URL.to_string(),
            ]
        );
    }

    #[test]
    fn gateway_candidates_default_only() {
        assert_eq!(
            gateway_candidates(&[], None),
            vec![DEFAULT_GATEWAY_URL.to_string()]
        );
    }

    #[test]
    fn preference_path_override() {
        assert_eq!(
            preference_path(Some("/tmp/pref")),
            PathBuf::from("/tmp/pref")
        );
        assert!(preference_path(None).ends_with("sheetgate/preferred-gateway"));
        assert!(preference_path(Some("  ")).ends_with("sheetgate/preferred-gateway"));
    }

    #[test]
    fn default_output_uses_input_stem() {
        assert_eq!(
            default_output_path(Path::new("/data/sales.csv")),
            PathBuf::from("/data/sales.xlsx")
        );
    }

    #[test]
    fn default_output_never_overwrites_xlsx_input() {
        for input in ["/data/book.xlsx", "book.xlsx", "/data/Book.XLSX"] {
            let input = Path::new(input);
            let output = default_output_path(input);
            assert_ne!(output.as_path(), input);
            assert_eq!(output.parent(), input.parent());
        }
        assert_eq!(
            default_output_path(Path::new("/data/book.xlsx")),
            PathBuf::from("/data/book-converted.xlsx")
        );
    }

    #[test]
    fn upload_from_path_detects_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("People.JSON");
        std::fs::write(&path, "[]").unwrap();

        let upload = upload_from_path(&path).unwrap();
        assert_eq!(upload.extension, "json");
        assert_eq!(upload.declared_mime_type.as_deref(), Some("application/json"));
        assert_eq!(upload.size_bytes, 2);
        assert_eq!(upload.original_name, "People.JSON");
    }

    #[test]
    fn upload_from_path_rejects_unsupported_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "hi").unwrap();
        assert!(upload_from_path(&txt).is_err());

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        assert!(upload_from_path(&empty).is_err());

        assert!(upload_from_path(&dir.path().join("missing.csv")).is_err());
    }
}
