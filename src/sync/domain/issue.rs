//! Remote issue records and the content written to them.

use super::{IssueNumber, LabelSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest issue title the tracker accepts, in characters.
pub const MAX_TITLE_CHARS: usize = 256;
/// Longest label name the tracker accepts, in characters.
pub const MAX_LABEL_CHARS: usize = 50;
/// Longest issue body the tracker accepts, in characters.
pub const MAX_BODY_CHARS: usize = 65_536;

/// Line prefix of the footer timestamp, excluded from body comparison.
pub const SYNC_TIMESTAMP_PREFIX: &str = "*Last synced:";

/// Open/closed state of a remote issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// The issue is open.
    Open,
    /// The issue is closed.
    Closed,
}

impl IssueState {
    /// Returns the tracker representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote issue mirroring a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker-assigned issue number.
    pub number: IssueNumber,
    /// Current issue title.
    pub title: String,
    /// Current issue body.
    pub body: String,
    /// Current open/closed state.
    pub state: IssueState,
    /// Labels currently attached to the issue.
    pub labels: LabelSet,
}

/// A content limit the tracker would reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentViolation {
    /// The title exceeds [`MAX_TITLE_CHARS`].
    TitleTooLong(usize),
    /// A label exceeds [`MAX_LABEL_CHARS`].
    LabelTooLong(String),
    /// The body exceeds [`MAX_BODY_CHARS`].
    BodyTooLong(usize),
}

impl fmt::Display for ContentViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TitleTooLong(length) => write!(
                f,
                "title has {length} characters, limit is {MAX_TITLE_CHARS}"
            ),
            Self::LabelTooLong(label) => write!(
                f,
                "label '{label}' exceeds {MAX_LABEL_CHARS} characters"
            ),
            Self::BodyTooLong(length) => {
                write!(f, "body has {length} characters, limit is {MAX_BODY_CHARS}")
            }
        }
    }
}

/// Title, body, and labels rendered for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContent {
    /// Rendered issue title.
    pub title: String,
    /// Rendered issue body, including the provenance footer.
    pub body: String,
    /// Full label set derived from the task.
    pub labels: LabelSet,
}

impl IssueContent {
    /// Checks the content against tracker limits.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContentViolation`] found.
    pub fn validate(&self) -> Result<(), ContentViolation> {
        let title_length = self.title.chars().count();
        if title_length > MAX_TITLE_CHARS {
            return Err(ContentViolation::TitleTooLong(title_length));
        }
        if let Some(label) = self
            .labels
            .iter()
            .find(|label| label.chars().count() > MAX_LABEL_CHARS)
        {
            return Err(ContentViolation::LabelTooLong(label.to_owned()));
        }
        let body_length = self.body.chars().count();
        if body_length > MAX_BODY_CHARS {
            return Err(ContentViolation::BodyTooLong(body_length));
        }
        Ok(())
    }

    /// Returns `true` when title or body differ from `issue`.
    ///
    /// The footer timestamp changes on every render and is ignored.
    #[must_use]
    pub fn text_differs_from(&self, issue: &Issue) -> bool {
        self.title != issue.title || !bodies_match(&self.body, &issue.body)
    }

    /// Returns `true` when the label set differs from `issue`.
    #[must_use]
    pub fn labels_differ_from(&self, issue: &Issue) -> bool {
        self.labels != issue.labels
    }
}

/// Compares two issue bodies, ignoring the sync timestamp line.
#[must_use]
pub fn bodies_match(left: &str, right: &str) -> bool {
    fn significant(body: &str) -> Vec<&str> {
        body.lines()
            .map(str::trim_end)
            .filter(|line| !line.starts_with(SYNC_TIMESTAMP_PREFIX))
            .collect()
    }
    significant(left) == significant(right)
}
