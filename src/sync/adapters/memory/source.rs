//! In-memory task source for hook tests.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::sync::ports::{TaskSource, TaskSourceError, TaskSourceResult};

/// Thread-safe map of paths to document contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskSource {
    files: Arc<RwLock<HashMap<Utf8PathBuf, String>>>,
}

impl InMemoryTaskSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces the document at `path`.
    pub fn write(&self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), contents.into());
        }
    }
}

#[async_trait]
impl TaskSource for InMemoryTaskSource {
    async fn read_to_string(&self, path: &Utf8Path) -> TaskSourceResult<String> {
        let files = self
            .files
            .read()
            .map_err(|err| TaskSourceError::io(path, std::io::Error::other(err.to_string())))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| TaskSourceError::NotFound(path.to_owned()))
    }
}
