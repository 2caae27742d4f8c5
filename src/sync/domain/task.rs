//! Task value objects parsed from markdown checklists.

use super::{SpecName, SyncDomainError, TaskKey};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Completion status expressed by a task checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// `- [ ]`: work has not started.
    NotStarted,
    /// `- [-]`: work is underway.
    InProgress,
    /// `- [x]`: work is finished.
    Completed,
}

impl TaskStatus {
    /// Returns the canonical label representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Maps a checkbox marker character to a status.
    #[must_use]
    pub const fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(Self::NotStarted),
            '-' => Some(Self::InProgress),
            'x' | 'X' => Some(Self::Completed),
            _ => None,
        }
    }

    /// Returns the icon shown at the start of issue titles.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::NotStarted => "📋",
            Self::InProgress => "🔄",
            Self::Completed => "✅",
        }
    }

    /// Returns `true` for [`TaskStatus::Completed`].
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File path and one-based line a task was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    path: Utf8PathBuf,
    line: usize,
}

impl SourceLocation {
    /// Creates a source location.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    /// Returns the source file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the one-based line number.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// Parameter object for constructing a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskData {
    /// Dotted task identifier.
    pub key: TaskKey,
    /// Task title as written after the identifier.
    pub title: String,
    /// Checkbox status.
    pub status: TaskStatus,
    /// Requirement references in document order.
    pub requirements: Vec<String>,
    /// Description collected from indented sub-bullets.
    pub description: String,
    /// Spec the task belongs to.
    pub spec_name: SpecName,
    /// Where the task line was found.
    pub source_location: SourceLocation,
    /// Most recent `## Phase` heading above the task, if any.
    pub phase_heading: Option<String>,
}

/// One unit of work parsed from a markdown checklist.
///
/// Tasks are recreated on every parse and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    key: TaskKey,
    title: String,
    status: TaskStatus,
    requirements: Vec<String>,
    description: String,
    spec_name: SpecName,
    source_location: SourceLocation,
    phase_heading: Option<String>,
}

impl Task {
    /// Creates a task from parsed values.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptyTaskTitle`] if the title is blank.
    pub fn new(data: TaskData) -> Result<Self, SyncDomainError> {
        let title = data.title.trim();
        if title.is_empty() {
            return Err(SyncDomainError::EmptyTaskTitle);
        }

        Ok(Self {
            key: data.key,
            title: title.to_owned(),
            status: data.status,
            requirements: data
                .requirements
                .into_iter()
                .map(|requirement| requirement.trim().to_owned())
                .filter(|requirement| !requirement.is_empty())
                .collect(),
            description: data.description.trim().to_owned(),
            spec_name: data.spec_name,
            source_location: data.source_location,
            phase_heading: data.phase_heading,
        })
    }

    /// Returns the dotted task identifier.
    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the checkbox status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns requirement references in document order.
    #[must_use]
    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    /// Returns the collected description, empty when none was given.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the owning spec name.
    #[must_use]
    pub const fn spec_name(&self) -> &SpecName {
        &self.spec_name
    }

    /// Returns the provenance of the task line.
    #[must_use]
    pub const fn source_location(&self) -> &SourceLocation {
        &self.source_location
    }

    /// Returns the narrative phase heading in effect for this task.
    #[must_use]
    pub fn phase_heading(&self) -> Option<&str> {
        self.phase_heading.as_deref()
    }
}
