//! Task source port for reading markdown task files.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task source operations.
pub type TaskSourceResult<T> = Result<T, TaskSourceError>;

/// Read access to task documents.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Reads the full text of the document at `path`.
    async fn read_to_string(&self, path: &Utf8Path) -> TaskSourceResult<String>;
}

/// Errors returned by task source implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskSourceError {
    /// No document exists at the path.
    #[error("task file not found: {0}")]
    NotFound(Utf8PathBuf),

    /// Reading the document failed.
    #[error("failed to read task file {path}: {source}")]
    Io {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Underlying failure.
        source: Arc<std::io::Error>,
    },
}

impl TaskSourceError {
    /// Wraps an I/O error, mapping `NotFound` to [`TaskSourceError::NotFound`].
    #[must_use]
    pub fn io(path: &Utf8Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path.to_owned());
        }
        Self::Io {
            path: path.to_owned(),
            source: Arc::new(err),
        }
    }
}
