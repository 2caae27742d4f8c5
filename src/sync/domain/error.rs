//! Error types for sync domain validation and parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while constructing sync domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncDomainError {
    /// The task identifier is not a dotted numeric value.
    #[error("invalid task identifier '{0}', expected dotted digits such as 10.2")]
    InvalidTaskKey(String),

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The issue number is invalid.
    #[error("invalid issue number {0}, expected a positive integer")]
    InvalidIssueNumber(u64),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTaskTitle,

    /// The spec name is empty after trimming.
    #[error("spec name must not be empty")]
    EmptySpecName,

    /// The issue body template failed to render.
    #[error("issue body rendering failed: {0}")]
    TemplateRender(String),
}

/// A markdown line that looked like a task but could not be parsed.
///
/// Parse errors never abort a document: the offending line is skipped and
/// the error is reported alongside the parsed tasks.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("line {line}: {reason}: {content}")]
pub struct TaskParseError {
    /// One-based line number of the skipped line.
    pub line: usize,
    /// Trimmed line content.
    pub content: String,
    /// Why the line was rejected.
    pub reason: String,
}
