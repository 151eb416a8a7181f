//! Request-scoped files on local disk.
//!
//! Every file the pipeline writes is a `TransientArtifact`. Cleanup is
//! idempotent and also runs from `Drop`, so early returns, panics and client
//! disconnects still remove the file.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use sheetgate_core::AppError;
use tokio::fs::{File, OpenOptions};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Directory shared by all concurrent requests.
#[derive(Debug, Clone)]
pub struct TransientStore {
    dir: PathBuf,
}

impl TransientStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Internal(format!(
                "Failed to create transient directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    /// Create a new empty artifact named `<unix-millis>-<uuid>.<ext>`.
    ///
    /// Opened with `create_new`, so a name collision fails instead of
    /// overwriting another request's file.
    pub async fn create(&self, extension: &str) -> Result<(TransientArtifact, File), AppError> {
        let name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        let path = self.dir.join(name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create transient file: {}", e)))?;

        tracing::debug!(path = %path.display(), "Created transient artifact");
        Ok((TransientArtifact::new(path), file))
    }
}

/// A file owned by exactly one request.
#[derive(Debug)]
pub struct TransientArtifact {
    path: PathBuf,
    removed: bool,
}

impl TransientArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Running it again, or on an already-missing file, is a no-op.
    pub async fn cleanup(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed transient artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                error = %e,
                path = %self.path.display(),
                "Failed to remove transient artifact"
            ),
        }
    }

    /// Stream the file and remove it once the stream is finished or dropped.
    pub async fn into_stream(self) -> Result<ArtifactStream, AppError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to open converted file: {}", e)))?;
        Ok(ArtifactStream {
            inner: ReaderStream::new(file),
            artifact: self,
        })
    }
}

impl Drop for TransientArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        // Blocking unlink, possibly on an async worker. Only reached when
        // `cleanup` was skipped; the file must be gone once the drop returns.
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed transient artifact on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                error = %e,
                path = %self.path.display(),
                "Failed to remove transient artifact on drop"
            ),
        }
    }
}

/// Pass-through body over an artifact that owns the file's lifetime.
pub struct ArtifactStream {
    inner: ReaderStream<File>,
    artifact: TransientArtifact,
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Err(ref e))) = polled {
            // Headers are already sent; the connection is terminated by the error.
            tracing::error!(
                error = %e,
                path = %this.artifact.path().display(),
                "Stream error sending converted file"
            );
        }
        polled
    }
}
