//! Capability-based filesystem task source.

use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use crate::sync::ports::{TaskSource, TaskSourceError, TaskSourceResult};

/// Reads task documents through `cap-std` directory handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapStdTaskSource;

impl CapStdTaskSource {
    /// Creates a filesystem task source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn read_document(path: &Utf8Path) -> TaskSourceResult<String> {
    let file_name = path.file_name().ok_or_else(|| {
        TaskSourceError::io(path, std::io::Error::other("path must include a file name"))
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| TaskSourceError::io(path, err))?;
    dir.read_to_string(file_name)
        .map_err(|err| TaskSourceError::io(path, err))
}

#[async_trait]
impl TaskSource for CapStdTaskSource {
    async fn read_to_string(&self, path: &Utf8Path) -> TaskSourceResult<String> {
        let owned = path.to_owned();
        tokio::task::spawn_blocking(move || read_document(&owned))
            .await
            .map_err(|err| TaskSourceError::io(path, std::io::Error::other(err.to_string())))?
    }
}

#[cfg(test)]
mod tests {
    use super::CapStdTaskSource;
    use crate::sync::ports::{TaskSource, TaskSourceError};
    use camino::Utf8PathBuf;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn reads_existing_document() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("tasks.md")).expect("utf-8 path");
        std::fs::write(&path, "- [ ] 1. Write tests\n").expect("write tasks");

        let contents = CapStdTaskSource::new()
            .read_to_string(&path)
            .await
            .expect("document is readable");

        assert_eq!(contents, "- [ ] 1. Write tests\n");
    }

    #[rstest]
    #[tokio::test]
    async fn missing_document_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.md")).expect("utf-8 path");

        let result = CapStdTaskSource::new().read_to_string(&path).await;

        assert!(matches!(result, Err(TaskSourceError::NotFound(_))));
    }
}
