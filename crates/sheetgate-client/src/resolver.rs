//! Candidate endpoint ordering and the persisted preferred endpoint.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Url;

use crate::error::ClientError;

/// Storage for the single "last known good" endpoint.
///
/// Writes are last-writer-wins; implementations only need to make a single
/// value replacement atomic.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load(&self) -> Option<String>;
    async fn store(&self, url: &str) -> Result<(), ClientError>;
}

/// Preferred endpoint held in process memory.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    value: RwLock<Option<String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(url: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(url.into())),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load(&self) -> Option<String> {
        self.value.read().ok().and_then(|v| v.clone())
    }

    async fn store(&self, url: &str) -> Result<(), ClientError> {
        if let Ok(mut guard) = self.value.write() {
            *guard = Some(url.to_string());
        }
        Ok(())
    }
}

/// Preferred endpoint persisted as a one-line text file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn load(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let value = contents.trim();
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to read preferred endpoint"
                );
                None
            }
        }
    }

    async fn store(&self, url: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(ClientError::Preference)?;
            }
        }

        // Write a sibling temp file, then rename over the target.
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, format!("{}\n", url)).await {
            return Err(ClientError::Preference(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ClientError::Preference(e));
        }
        Ok(())
    }
}

/// Produces the ordered, deduplicated candidate list.
#[derive(Clone)]
pub struct EndpointResolver {
    configured: Vec<String>,
    store: Arc<dyn PreferenceStore>,
}

impl std::fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

impl EndpointResolver {
    /// Invalid configured URLs are dropped with a warning.
    pub fn new(configured: Vec<String>, store: Arc<dyn PreferenceStore>) -> Self {
        let configured = configured
            .iter()
            .filter_map(|raw| {
                let normalized = normalize_base_url(raw);
                if normalized.is_none() {
                    tracing::warn!(url = %raw, "Ignoring invalid endpoint URL");
                }
                normalized
            })
            .collect();
        Self { configured, store }
    }

    /// Resolver with an in-memory preference.
    pub fn in_memory(configured: Vec<String>) -> Self {
        Self::new(configured, Arc::new(MemoryPreferenceStore::new()))
    }

    /// Persisted preferred endpoint, if present and a valid base URL.
    pub async fn preferred(&self) -> Option<String> {
        let raw = self.store.load().await?;
        let normalized = normalize_base_url(&raw);
        if normalized.is_none() {
            tracing::warn!(url = %raw, "Ignoring invalid preferred endpoint");
        }
        normalized
    }

    /// Preferred endpoint first, then configured ones; first occurrence wins.
    pub async fn resolve_candidates(&self) -> Result<Vec<String>, ClientError> {
        let preferred = self.preferred().await;

        let mut candidates: Vec<String> = Vec::with_capacity(self.configured.len() + 1);
        for url in preferred.into_iter().chain(self.configured.iter().cloned()) {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }

        if candidates.is_empty() {
            return Err(ClientError::NoCandidates);
        }

        Ok(candidates)
    }

    /// Remember `url` as the preferred endpoint. Persistence failures are logged.
    pub async fn record_success(&self, url: &str) {
        let Some(normalized) = normalize_base_url(url) else {
            tracing::warn!(url = %url, "Not recording invalid endpoint as preferred");
            return;
        };

        match self.store.store(&normalized).await {
            Ok(()) => tracing::debug!(endpoint = %normalized, "Recorded preferred endpoint"),
            Err(e) => tracing::warn!(error = %e, endpoint = %normalized, "Failed to record preferred endpoint"),
        }
    }
}

/// Trim whitespace and trailing slashes; accept only absolute http(s) URLs with a host.
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    Some(trimmed.to_string())
}
