//! Run reports for dry-run and live synchronisation.

use super::{
    COMPONENT_LABEL_PREFIX, LabelSet, PHASE_LABEL_PREFIX, RunId, STATUS_LABEL_PREFIX, SyncPhase,
    Task, TaskKey, TaskParseError, derive_labels, issue_title,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of planned issues listed in a dry-run sample.
pub const DRY_RUN_SAMPLE_LIMIT: usize = 10;

/// Task counts grouped by derived label family.
///
/// Built from [`derive_labels`], so dry-run and live runs count the same
/// statuses, components, and phases for the same input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    /// Task count per status label value.
    pub by_status: BTreeMap<String, usize>,
    /// Task count per component label value.
    pub by_component: BTreeMap<String, usize>,
    /// Task count per phase label value.
    pub by_phase: BTreeMap<String, usize>,
}

impl TaskAnalysis {
    /// Counts the labels derived for `tasks`.
    #[must_use]
    pub fn from_tasks(tasks: &[Task], label_prefix: &str) -> Self {
        let mut analysis = Self::default();
        for task in tasks {
            let labels = derive_labels(task, label_prefix);
            count_into(&mut analysis.by_status, &labels, STATUS_LABEL_PREFIX);
            count_into(&mut analysis.by_component, &labels, COMPONENT_LABEL_PREFIX);
            count_into(&mut analysis.by_phase, &labels, PHASE_LABEL_PREFIX);
        }
        analysis
    }
}

fn count_into(counts: &mut BTreeMap<String, usize>, labels: &LabelSet, prefix: &str) {
    for value in labels.values_with_prefix(prefix) {
        *counts.entry(value.to_owned()).or_default() += 1;
    }
}

/// One issue a live run would write, as shown in dry-run samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedIssue {
    /// Task identifier.
    pub task_id: TaskKey,
    /// Issue title that would be written.
    pub title: String,
    /// Labels that would replace the issue's labels.
    pub labels: LabelSet,
    /// Whether the issue would end up closed.
    pub closed: bool,
}

impl PlannedIssue {
    /// Plans the issue for a task.
    #[must_use]
    pub fn for_task(task: &Task, label_prefix: &str) -> Self {
        Self {
            task_id: task.key().clone(),
            title: issue_title(task),
            labels: derive_labels(task, label_prefix),
            closed: task.status().is_completed(),
        }
    }
}

/// Result of a dry run: what a live run would act upon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Number of tasks a live run would reconcile.
    pub total_tasks: usize,
    /// Counts by status, component, and phase.
    pub analysis: TaskAnalysis,
    /// The first [`DRY_RUN_SAMPLE_LIMIT`] planned issues.
    pub sample: Vec<PlannedIssue>,
    /// Lines skipped by the parser.
    pub skipped_lines: Vec<TaskParseError>,
    /// Task identifiers that appeared more than once.
    pub duplicate_ids: Vec<TaskKey>,
}

impl fmt::Display for DryRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dry run {}: {} tasks", self.run_id, self.total_tasks)?;
        write_counts(f, "status", &self.analysis.by_status)?;
        write_counts(f, "phase", &self.analysis.by_phase)?;
        write_counts(f, "component", &self.analysis.by_component)?;
        for planned in &self.sample {
            let state = if planned.closed { "closed" } else { "open" };
            writeln!(f, "  {} ({state})", planned.title)?;
        }
        if self.total_tasks > self.sample.len() {
            writeln!(
                f,
                "  ... and {} more",
                self.total_tasks.saturating_sub(self.sample.len())
            )?;
        }
        write_warnings(f, &self.skipped_lines, &self.duplicate_ids)
    }
}

/// Mutation applied to an issue while reconciling one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// A new issue was created.
    Created,
    /// Title, body, or labels were rewritten.
    Updated,
    /// The issue was closed.
    Closed,
    /// The issue was reopened.
    Reopened,
}

/// A task that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Task identifier.
    pub task_id: TaskKey,
    /// Failure description.
    pub message: String,
}

/// A task that was reconciled but needs attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWarning {
    /// Task identifier.
    pub task_id: TaskKey,
    /// Warning description.
    pub message: String,
}

/// Result of a live sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Number of tasks selected for reconciliation.
    pub total_tasks: usize,
    /// Issues created.
    pub created: usize,
    /// Issues whose title, body, or labels were rewritten.
    pub updated: usize,
    /// Issues closed.
    pub closed: usize,
    /// Issues reopened.
    pub reopened: usize,
    /// Tasks whose issue already matched.
    pub unchanged: usize,
    /// Per-task failures.
    pub errors: Vec<TaskFailure>,
    /// Per-task warnings, such as several issues sharing one identity label.
    #[serde(default)]
    pub warnings: Vec<TaskWarning>,
    /// Counts by status, component, and phase.
    pub analysis: TaskAnalysis,
    /// Lines skipped by the parser.
    pub skipped_lines: Vec<TaskParseError>,
    /// Task identifiers that appeared more than once.
    pub duplicate_ids: Vec<TaskKey>,
    /// Whether the run stopped early on a cancellation request.
    pub cancelled: bool,
    /// Phases the run passed through.
    pub phases: Vec<SyncPhase>,
    #[serde(default)]
    processed: usize,
}

impl SyncReport {
    /// Creates an empty report for `total_tasks` tasks.
    #[must_use]
    pub const fn new(run_id: RunId, total_tasks: usize, analysis: TaskAnalysis) -> Self {
        Self {
            run_id,
            total_tasks,
            created: 0,
            updated: 0,
            closed: 0,
            reopened: 0,
            unchanged: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            analysis,
            skipped_lines: Vec::new(),
            duplicate_ids: Vec::new(),
            cancelled: false,
            phases: Vec::new(),
            processed: 0,
        }
    }

    /// Records the actions applied for one task.
    pub fn record_actions(&mut self, actions: &[SyncAction]) {
        self.processed += 1;
        if actions.is_empty() {
            self.unchanged += 1;
        }
        for action in actions {
            match action {
                SyncAction::Created => self.created += 1,
                SyncAction::Updated => self.updated += 1,
                SyncAction::Closed => self.closed += 1,
                SyncAction::Reopened => self.reopened += 1,
            }
        }
    }

    /// Records a per-task failure.
    pub fn record_failure(&mut self, task_id: TaskKey, message: impl Into<String>) {
        self.processed += 1;
        self.errors.push(TaskFailure {
            task_id,
            message: message.into(),
        });
    }

    /// Records a warning for a task that was still reconciled.
    pub fn record_warning(&mut self, task_id: TaskKey, message: impl Into<String>) {
        self.warnings.push(TaskWarning {
            task_id,
            message: message.into(),
        });
    }

    /// Returns the total number of mutations performed.
    #[must_use]
    pub const fn mutation_count(&self) -> usize {
        self.created + self.updated + self.closed + self.reopened
    }

    /// Returns the number of tasks reconciled without error.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.processed.saturating_sub(self.errors.len())
    }

    /// Returns the number of tasks that were attempted.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.processed
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sync {}: {} tasks, {} succeeded, {} errored",
            self.run_id,
            self.total_tasks,
            self.succeeded(),
            self.errors.len()
        )?;
        writeln!(
            f,
            "  created {}, updated {}, closed {}, reopened {}, unchanged {}",
            self.created, self.updated, self.closed, self.reopened, self.unchanged
        )?;
        if self.cancelled {
            writeln!(
                f,
                "  cancelled after {} of {} tasks",
                self.processed, self.total_tasks
            )?;
        }
        for failure in &self.errors {
            writeln!(f, "  error [{}]: {}", failure.task_id, failure.message)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning [{}]: {}", warning.task_id, warning.message)?;
        }
        write_warnings(f, &self.skipped_lines, &self.duplicate_ids)
    }
}

fn write_counts(
    f: &mut fmt::Formatter<'_>,
    family: &str,
    counts: &BTreeMap<String, usize>,
) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    let rendered: Vec<String> = counts
        .iter()
        .map(|(value, count)| format!("{value}={count}"))
        .collect();
    writeln!(f, "  by {family}: {}", rendered.join(", "))
}

fn write_warnings(
    f: &mut fmt::Formatter<'_>,
    skipped_lines: &[TaskParseError],
    duplicate_ids: &[TaskKey],
) -> fmt::Result {
    for skipped in skipped_lines {
        writeln!(f, "  skipped {skipped}")?;
    }
    for duplicate in duplicate_ids {
        writeln!(f, "  duplicate task id {duplicate}, last occurrence wins")?;
    }
    Ok(())
}
