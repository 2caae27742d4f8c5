//! Issue tracker port used by reconciliation.

use crate::sync::domain::{Issue, IssueNumber, LabelSet};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for issue tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Outcome of a tracker connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCheck {
    /// Whether the tracker accepted the credentials and repository.
    pub success: bool,
    /// Human-readable detail.
    pub message: String,
}

impl ConnectionCheck {
    /// Creates a successful check.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates a failed check.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Issue tracker contract.
///
/// Implementations report failures as [`TrackerError`] values whose
/// [`TrackerErrorKind`] lets callers decide between aborting a run and
/// recording a per-task failure.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Finds every issue carrying `label`, open or closed, newest first.
    ///
    /// More than one result means the identity label was duplicated
    /// outside this tool.
    async fn find_issues_by_label(&self, label: &str) -> TrackerResult<Vec<Issue>>;

    /// Creates an open issue.
    ///
    /// Creation is not idempotent: callers retrying it must look the issue
    /// up again first.
    async fn create_issue(&self, title: &str, body: &str, labels: &LabelSet)
    -> TrackerResult<Issue>;

    /// Rewrites an issue's title and body.
    async fn update_issue(&self, number: IssueNumber, title: &str, body: &str)
    -> TrackerResult<()>;

    /// Replaces an issue's labels.
    async fn update_issue_labels(&self, number: IssueNumber, labels: &LabelSet)
    -> TrackerResult<()>;

    /// Closes an issue.
    async fn close_issue(&self, number: IssueNumber) -> TrackerResult<()>;

    /// Reopens a closed issue.
    async fn reopen_issue(&self, number: IssueNumber) -> TrackerResult<()>;

    /// Verifies credentials and repository access.
    async fn test_connection(&self) -> TrackerResult<ConnectionCheck>;
}

/// Classification of tracker failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerErrorKind {
    /// Credentials were rejected.
    Auth,
    /// The rate limit is exhausted.
    RateLimit,
    /// The addressed entity does not exist.
    NotFound,
    /// The request failed in transit or timed out.
    Network,
    /// The tracker rejected the request payload.
    Validation,
    /// Any other failure.
    Unknown,
}

impl TrackerErrorKind {
    /// Returns `true` for kinds worth retrying.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RateLimit | Self::Network)
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::NotFound => "not_found",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrackerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by issue tracker implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The rate limit is exhausted.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Failure detail.
        message: String,
        /// Server-suggested wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The addressed entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request failed in transit or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The tracker rejected the request payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any other failure.
    #[error("tracker error: {0}")]
    Unknown(String),
}

impl TrackerError {
    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> TrackerErrorKind {
        match self {
            Self::Auth(_) => TrackerErrorKind::Auth,
            Self::RateLimited { .. } => TrackerErrorKind::RateLimit,
            Self::NotFound(_) => TrackerErrorKind::NotFound,
            Self::Network(_) => TrackerErrorKind::Network,
            Self::Validation(_) => TrackerErrorKind::Validation,
            Self::Unknown(_) => TrackerErrorKind::Unknown,
        }
    }

    /// Returns `true` when retrying may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    /// Returns the server-suggested retry delay, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Creates a rate-limit error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after,
        }
    }
}
