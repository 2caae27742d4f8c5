//! Markdown task checklist parser.
//!
//! Recognised layout:
//!
//! ```text
//! ## Phase 1: Foundation
//!
//! - [x] 1. Set up workspace
//!   - Create the repository skeleton
//!   - _Requirements: 1.1, 1.2_
//! - [-] 1.1 Malformed, skipped (no period after the id)
//! ```
//!
//! Lines are trimmed before matching so `\n` and `\r\n` documents parse to
//! the same tasks.

use super::{
    SourceLocation, SpecName, SyncDomainError, Task, TaskData, TaskKey, TaskParseError,
    TaskStatus,
};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Number of lines after a task line searched for its details.
const DETAIL_WINDOW: usize = 15;

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-\s+\[([ xX-])\]\s+(\d+(?:\.\d+)*)\.\s+(\S.*)$").expect("valid task pattern")
});

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static CHECKBOX_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s+\[[ xX-]\]").expect("valid checkbox pattern"));

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static PHASE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##\s+Phase\s+\d+\s*:.*$").expect("valid phase heading pattern")
});

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static REQUIREMENTS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:-\s+)?_Requirements:\s*(.*?)_?$").expect("valid requirements pattern")
});

/// Identifies the document being parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    spec_name: SpecName,
    path: Utf8PathBuf,
}

impl SourceContext {
    /// Creates a source context.
    #[must_use]
    pub fn new(spec_name: SpecName, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            spec_name,
            path: path.into(),
        }
    }

    /// Creates a source context whose spec name is derived from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::EmptySpecName`] when no name can be derived.
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Result<Self, SyncDomainError> {
        let owned_path = path.into();
        let spec_name = SpecName::from_source_path(&owned_path)?;
        Ok(Self::new(spec_name, owned_path))
    }

    /// Returns the spec name applied to every parsed task.
    #[must_use]
    pub const fn spec_name(&self) -> &SpecName {
        &self.spec_name
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Tasks parsed from one document and the lines that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTasks {
    /// Tasks in document order, duplicates included.
    pub tasks: Vec<Task>,
    /// Checkbox lines that could not be parsed.
    pub skipped: Vec<TaskParseError>,
}

#[derive(Debug, Default)]
struct TaskDetails {
    description: Vec<String>,
    requirements: Vec<String>,
}

/// Parses a markdown checklist into tasks.
///
/// Malformed checkbox lines are skipped and reported in
/// [`ParsedTasks::skipped`]; parsing never fails as a whole.
#[must_use]
pub fn parse_tasks(markdown: &str, context: &SourceContext) -> ParsedTasks {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut parsed = ParsedTasks::default();
    let mut phase_heading: Option<String> = None;

    for (index, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();
        let line_number = index + 1;

        if PHASE_HEADING.is_match(line) {
            phase_heading = Some(line.trim_start_matches('#').trim().to_owned());
            continue;
        }
        if !CHECKBOX_LINE.is_match(line) {
            continue;
        }

        let following = lines.get(index + 1..).unwrap_or_default();
        match parse_task_line(line, line_number, following, context, phase_heading.as_deref()) {
            Ok(task) => parsed.tasks.push(task),
            Err(error) => {
                warn!(
                    path = %context.path(),
                    line = error.line,
                    reason = %error.reason,
                    "skipping malformed task line"
                );
                parsed.skipped.push(error);
            }
        }
    }
    parsed
}

fn parse_task_line(
    line: &str,
    line_number: usize,
    following: &[&str],
    context: &SourceContext,
    phase_heading: Option<&str>,
) -> Result<Task, TaskParseError> {
    let reject = |reason: String| TaskParseError {
        line: line_number,
        content: line.to_owned(),
        reason,
    };

    let captures = TASK_LINE
        .captures(line)
        .ok_or_else(|| reject("expected '<id>. <title>' after the checkbox".to_owned()))?;
    let marker = captures
        .get(1)
        .and_then(|capture| capture.as_str().chars().next())
        .ok_or_else(|| reject("missing checkbox marker".to_owned()))?;
    let status = TaskStatus::from_marker(marker)
        .ok_or_else(|| reject(format!("unknown checkbox marker '{marker}'")))?;
    let key = captures
        .get(2)
        .map(|capture| TaskKey::new(capture.as_str()))
        .ok_or_else(|| reject("missing task id".to_owned()))?
        .map_err(|error| reject(error.to_string()))?;
    let title = captures
        .get(3)
        .map(|capture| capture.as_str().to_owned())
        .unwrap_or_default();

    let details = collect_details(following);
    Task::new(TaskData {
        key,
        title,
        status,
        requirements: details.requirements,
        description: details.description.join("\n"),
        spec_name: context.spec_name().clone(),
        source_location: SourceLocation::new(context.path(), line_number),
        phase_heading: phase_heading.map(str::to_owned),
    })
    .map_err(|error| reject(error.to_string()))
}

fn collect_details(following: &[&str]) -> TaskDetails {
    let mut details = TaskDetails::default();
    for raw_line in following.iter().take(DETAIL_WINDOW) {
        let line = raw_line.trim();
        if line.is_empty() || CHECKBOX_LINE.is_match(line) {
            break;
        }
        if let Some(captures) = REQUIREMENTS_LINE.captures(line) {
            details.requirements = captures
                .get(1)
                .map(|capture| split_requirements(capture.as_str()))
                .unwrap_or_default();
            break;
        }

        let is_indented = raw_line.starts_with([' ', '\t']);
        let bullet = line.strip_prefix("- ").or_else(|| line.strip_prefix("* "));
        if let Some(text) = bullet.filter(|_| is_indented) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                details.description.push(trimmed.to_owned());
            }
        }
    }
    details
}

fn split_requirements(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| {
            token
                .trim()
                .trim_matches(|c: char| c == '(' || c == ')')
                .trim()
                .to_owned()
        })
        .filter(|token| !token.is_empty())
        .collect()
}
