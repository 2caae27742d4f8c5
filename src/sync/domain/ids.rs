//! Identifier and validated scalar types for the sync domain.

use super::SyncDomainError;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dotted numeric task identifier such as `1` or `10.2`.
///
/// The key is the task's only durable identity: it is embedded in the
/// identity label that links a task to its tracker issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskKey(String);

impl TaskKey {
    /// Creates a validated task key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidTaskKey`] unless the value consists
    /// of one or more digit runs joined by single dots.
    pub fn new(value: impl Into<String>) -> Result<Self, SyncDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        let is_valid = !normalized.is_empty()
            && normalized
                .split('.')
                .all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()));

        if !is_valid {
            return Err(SyncDomainError::InvalidTaskKey(raw));
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value of the first segment.
    ///
    /// Segments too large for `u64` saturate to `u64::MAX`.
    #[must_use]
    pub fn leading_segment(&self) -> u64 {
        self.0
            .split('.')
            .next()
            .and_then(|segment| segment.parse().ok())
            .unwrap_or(u64::MAX)
    }
}

impl TryFrom<String> for TaskKey {
    type Error = SyncDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskKey> for String {
    fn from(value: TaskKey) -> Self {
        value.0
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Positive issue number from the remote tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(u64);

impl IssueNumber {
    /// Creates a validated issue number.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidIssueNumber`] when the value is zero.
    pub const fn new(value: u64) -> Result<Self, SyncDomainError> {
        if value == 0 {
            return Err(SyncDomainError::InvalidIssueNumber(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalized external repository identifier in `owner/repo` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryFullName(String);

impl RepositoryFullName {
    /// Creates a validated repository name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::InvalidRepository`] if the value does not
    /// contain exactly one slash-delimited owner and repository segment.
    pub fn new(value: impl Into<String>) -> Result<Self, SyncDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        let mut segments = normalized.split('/');
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();
        let has_more_segments = segments.next().is_some();
        let is_valid = !owner.is_empty()
            && !repo.is_empty()
            && !has_more_segments
            && !normalized.chars().any(char::is_whitespace);

        if !is_valid {
            return Err(SyncDomainError::InvalidRepository(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the repository name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepositoryFullName {
    type Error = SyncDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepositoryFullName> for String {
    fn from(value: RepositoryFullName) -> Self {
        value.0
    }
}

impl AsRef<str> for RepositoryFullName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepositoryFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name grouping tasks that come from the same source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecName(String);

impl SpecName {
    /// Creates a validated spec name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptySpecName`] if the value is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, SyncDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(SyncDomainError::EmptySpecName);
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Derives the spec name from a task file path.
    ///
    /// Spec task files live at `<specs>/<name>/tasks.md`, so the parent
    /// directory names the spec. Files without a named parent fall back to
    /// their file stem.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptySpecName`] if neither the parent
    /// directory nor the file stem yields a name.
    pub fn from_source_path(path: &Utf8Path) -> Result<Self, SyncDomainError> {
        let parent_name = path
            .parent()
            .and_then(Utf8Path::file_name)
            .filter(|name| !name.trim().is_empty() && *name != "." && *name != "..");
        let name = parent_name.or_else(|| path.file_stem()).unwrap_or_default();
        Self::new(name)
    }

    /// Returns the spec name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SpecName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SpecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
