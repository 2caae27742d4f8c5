//! Domain model for task-to-issue synchronisation.
//!
//! Tasks are parsed from markdown, labelled deterministically, and rendered
//! into issue content without touching any infrastructure. Tracker access,
//! file access, and user prompts stay outside the domain boundary.

mod error;
mod ids;
mod issue;
mod labels;
mod parser;
mod render;
mod report;
mod run;
mod task;

pub use error::{SyncDomainError, TaskParseError};
pub use ids::{IssueNumber, RepositoryFullName, SpecName, TaskKey};
pub use issue::{
    ContentViolation, Issue, IssueContent, IssueState, MAX_BODY_CHARS, MAX_LABEL_CHARS,
    MAX_TITLE_CHARS, SYNC_TIMESTAMP_PREFIX, bodies_match,
};
pub use labels::{
    COMPONENT_LABEL_PREFIX, LabelSet, PHASE_LABEL_PREFIX, REQUIREMENT_LABEL_PREFIX,
    SPEC_LABEL_PREFIX, STATUS_LABEL_PREFIX, components_for, derive_labels, identity_label,
    is_labelled_requirement, phase_for,
};
pub use parser::{ParsedTasks, SourceContext, parse_tasks};
pub use render::{describe_requirement, issue_body, issue_title, render_issue};
pub use report::{
    DRY_RUN_SAMPLE_LIMIT, DryRunReport, PlannedIssue, SyncAction, SyncReport, TaskAnalysis,
    TaskFailure, TaskWarning,
};
pub use run::{RunId, SyncPhase};
pub use task::{SourceLocation, Task, TaskData, TaskStatus};
