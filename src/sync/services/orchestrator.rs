//! Dry-run analysis and live synchronisation of a task document.

use super::{
    CancellationFlag, CreateRetry, ReconciliationService, RepositoryLocks, RunGuard, TaskOutcome,
};
use crate::sync::{
    config::{ConfigError, SyncConfig},
    domain::{
        DRY_RUN_SAMPLE_LIMIT, DryRunReport, PlannedIssue, RepositoryFullName, RunId,
        SourceContext, SpecName, SyncDomainError, SyncPhase, SyncReport, Task, TaskAnalysis,
        TaskKey, TaskParseError, parse_tasks,
    },
    ports::{IssueTracker, TaskSource, TaskSourceError, TrackerError},
};
use camino::Utf8Path;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Run-level failures that stop a sync before or during reconciliation.
#[derive(Debug, Clone, Error)]
pub enum SyncRunError {
    /// The configuration is invalid; nothing was sent to the tracker.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tracker rejected the credentials.
    ///
    /// When the rejection arrived mid-run, `partial` holds what the run
    /// had done up to that point.
    #[error("tracker authentication failed: {message}")]
    Auth {
        /// Tracker message.
        message: String,
        /// Report of the tasks processed before the abort.
        partial: Option<Box<SyncReport>>,
    },

    /// The tracker could not be reached or the repository is not usable.
    #[error("tracker connection check failed: {0}")]
    Connection(String),

    /// Another run holds the repository.
    #[error("a sync for {0} is already running")]
    Busy(RepositoryFullName),

    /// The task document could not be read.
    #[error(transparent)]
    Source(#[from] TaskSourceError),

    /// The document's spec name could not be determined.
    #[error(transparent)]
    Domain(#[from] SyncDomainError),

    /// The run attempted an illegal lifecycle transition.
    #[error("illegal sync phase transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase.
        from: SyncPhase,
        /// Rejected phase.
        to: SyncPhase,
    },
}

impl SyncRunError {
    /// Returns the report of the work done before a mid-run abort.
    #[must_use]
    pub fn partial_report(&self) -> Option<&SyncReport> {
        match self {
            Self::Auth {
                partial: Some(report),
                ..
            } => Some(report),
            _ => None,
        }
    }

    fn with_partial(self, report: SyncReport) -> Self {
        match self {
            Self::Auth { message, .. } => Self::Auth {
                message,
                partial: Some(Box::new(report)),
            },
            other => other,
        }
    }
}

/// A task document and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    context: SourceContext,
    contents: String,
}

impl SourceDocument {
    /// Wraps already-loaded document text.
    #[must_use]
    pub fn new(context: SourceContext, contents: impl Into<String>) -> Self {
        Self {
            context,
            contents: contents.into(),
        }
    }

    /// Reads the document at `path` through `source`.
    ///
    /// The spec name comes from `spec_override` when given and is derived
    /// from the path otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SyncRunError::Source`] when the document cannot be read and
    /// [`SyncRunError::Domain`] when no spec name can be determined.
    pub async fn load<S>(
        source: &S,
        path: &Utf8Path,
        spec_override: Option<SpecName>,
    ) -> Result<Self, SyncRunError>
    where
        S: TaskSource + ?Sized,
    {
        let context = match spec_override {
            Some(spec_name) => SourceContext::new(spec_name, path),
            None => SourceContext::from_path(path)?,
        };
        let contents = source.read_to_string(path).await?;
        Ok(Self::new(context, contents))
    }

    /// Returns the parse context.
    #[must_use]
    pub const fn context(&self) -> &SourceContext {
        &self.context
    }

    /// Returns the raw markdown.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// Tasks selected for a run after duplicate resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedTasks {
    /// One task per identifier, in order of each identifier's last line.
    pub tasks: Vec<Task>,
    /// Lines the parser skipped.
    pub skipped: Vec<TaskParseError>,
    /// Identifiers that appeared more than once.
    pub duplicate_ids: Vec<TaskKey>,
}

/// Parses a document and resolves duplicate identifiers.
///
/// When an identifier appears more than once the last occurrence wins.
/// Dry runs and live runs both go through this function.
#[must_use]
pub fn prepare_tasks(document: &SourceDocument) -> PreparedTasks {
    let parsed = parse_tasks(document.contents(), document.context());

    let mut last_seen: HashMap<TaskKey, usize> = HashMap::new();
    let mut duplicate_ids: Vec<TaskKey> = Vec::new();
    for (position, task) in parsed.tasks.iter().enumerate() {
        let replaced = last_seen.insert(task.key().clone(), position);
        if replaced.is_some() && !duplicate_ids.contains(task.key()) {
            duplicate_ids.push(task.key().clone());
        }
    }
    for duplicate in &duplicate_ids {
        warn!(
            task_id = %duplicate,
            path = %document.context().path(),
            "duplicate task id, keeping the last occurrence"
        );
    }

    let tasks = parsed
        .tasks
        .into_iter()
        .enumerate()
        .filter(|(position, task)| last_seen.get(task.key()) == Some(position))
        .map(|(_, task)| task)
        .collect();

    PreparedTasks {
        tasks,
        skipped: parsed.skipped,
        duplicate_ids,
    }
}

fn duplicate_warning(outcome: &TaskOutcome) -> Option<String> {
    if outcome.duplicate_issues.is_empty() {
        return None;
    }
    let numbers: Vec<String> = outcome
        .duplicate_issues
        .iter()
        .map(|number| format!("#{}", number.value()))
        .collect();
    Some(format!(
        "issue #{} reconciled; other issues share its label: {}",
        outcome.issue.value(),
        numbers.join(", ")
    ))
}

/// Records the phases a run passes through and rejects illegal moves.
#[derive(Debug, Clone)]
struct PhaseTracker {
    history: Vec<SyncPhase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            history: vec![SyncPhase::Idle],
        }
    }

    fn current(&self) -> SyncPhase {
        self.history.last().copied().unwrap_or(SyncPhase::Idle)
    }

    fn advance(&mut self, next: SyncPhase) -> Result<(), SyncRunError> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(SyncRunError::InvalidTransition { from, to: next });
        }
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Failed` and hands `failure` back for propagation.
    fn fail(&mut self, failure: SyncRunError) -> SyncRunError {
        if self.current().can_transition_to(SyncPhase::Failed) {
            self.history.push(SyncPhase::Failed);
        }
        error!(error = %failure, "sync run failed");
        failure
    }

    fn into_history(self) -> Vec<SyncPhase> {
        self.history
    }
}

/// Analyses `document` under `config` without contacting any tracker.
///
/// Uses the same task preparation and label derivation as a live run, so
/// the counts match what [`SyncOrchestrator::run`] would reconcile.
///
/// # Errors
///
/// Returns [`SyncRunError::Config`] when the configuration is invalid.
pub fn dry_run(
    config: &SyncConfig,
    document: &SourceDocument,
) -> Result<DryRunReport, SyncRunError> {
    config.validate()?;
    let mut phases = PhaseTracker::new();
    phases.advance(SyncPhase::Parsing)?;
    let prepared = prepare_tasks(document);
    phases.advance(SyncPhase::DryRunReport)?;

    let prefix = config.label_prefix.as_str();
    let report = DryRunReport {
        run_id: RunId::new(),
        total_tasks: prepared.tasks.len(),
        analysis: TaskAnalysis::from_tasks(&prepared.tasks, prefix),
        sample: prepared
            .tasks
            .iter()
            .take(DRY_RUN_SAMPLE_LIMIT)
            .map(|task| PlannedIssue::for_task(task, prefix))
            .collect(),
        skipped_lines: prepared.skipped,
        duplicate_ids: prepared.duplicate_ids,
    };
    phases.advance(SyncPhase::Done)?;
    info!(
        run_id = %report.run_id,
        path = %document.context().path(),
        total_tasks = report.total_tasks,
        skipped = report.skipped_lines.len(),
        "dry run complete"
    );
    Ok(report)
}

/// Coordinates dry runs and live runs against one repository.
#[derive(Clone)]
pub struct SyncOrchestrator<T, C>
where
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    config: SyncConfig,
    tracker: Arc<T>,
    locks: RepositoryLocks,
    reconciler: ReconciliationService<T, C>,
}

impl<T, C> SyncOrchestrator<T, C>
where
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator.
    ///
    /// Orchestrators sharing `locks` never run live against the same
    /// repository at the same time.
    #[must_use]
    pub fn new(
        config: SyncConfig,
        tracker: Arc<T>,
        clock: Arc<C>,
        locks: RepositoryLocks,
    ) -> Self {
        let reconciler =
            ReconciliationService::new(Arc::clone(&tracker), clock, config.label_prefix.clone())
                .with_create_retry(CreateRetry::from_config(&config));
        Self {
            config,
            tracker,
            locks,
            reconciler,
        }
    }

    /// Returns the run configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Analyses `document` without contacting the tracker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncRunError::Config`] when the configuration is invalid.
    pub fn dry_run(&self, document: &SourceDocument) -> Result<DryRunReport, SyncRunError> {
        dry_run(&self.config, document)
    }

    /// Runs a live sync, waiting for any active run on the repository.
    ///
    /// # Errors
    ///
    /// Returns [`SyncRunError`] for configuration, authentication, and
    /// connection failures. Per-task failures are recorded in the report.
    pub async fn run(
        &self,
        document: &SourceDocument,
        cancel: &CancellationFlag,
    ) -> Result<SyncReport, SyncRunError> {
        let repository = self.config.validate()?;
        let guard = self.locks.acquire(&repository).await;
        self.run_locked(document, cancel, &guard).await
    }

    /// Runs a live sync unless another run holds the repository.
    ///
    /// # Errors
    ///
    /// Returns [`SyncRunError::Busy`] when the repository is held, and the
    /// errors of [`SyncOrchestrator::run`] otherwise.
    pub async fn try_run(
        &self,
        document: &SourceDocument,
        cancel: &CancellationFlag,
    ) -> Result<SyncReport, SyncRunError> {
        let repository = self.config.validate()?;
        let guard = self
            .locks
            .try_acquire(&repository)
            .ok_or(SyncRunError::Busy(repository))?;
        self.run_locked(document, cancel, &guard).await
    }

    async fn run_locked(
        &self,
        document: &SourceDocument,
        cancel: &CancellationFlag,
        guard: &RunGuard,
    ) -> Result<SyncReport, SyncRunError> {
        let run_id = RunId::new();
        let repository = guard.repository();
        let mut phases = PhaseTracker::new();

        phases.advance(SyncPhase::Parsing)?;
        let prepared = prepare_tasks(document);

        if let Err(failure) = self.check_connection().await {
            return Err(phases.fail(failure));
        }
        phases.advance(SyncPhase::Reconciling)?;

        let analysis = TaskAnalysis::from_tasks(&prepared.tasks, &self.config.label_prefix);
        let mut report = SyncReport::new(run_id, prepared.tasks.len(), analysis);
        report.skipped_lines = prepared.skipped;
        report.duplicate_ids = prepared.duplicate_ids;
        info!(%run_id, %repository, total_tasks = report.total_tasks, "sync started");

        for task in &prepared.tasks {
            if cancel.is_cancelled() {
                info!(%run_id, processed = report.processed(), "sync cancelled");
                report.cancelled = true;
                break;
            }
            match self.reconciler.reconcile(task).await {
                Ok(outcome) => {
                    info!(
                        task_id = %outcome.task_id,
                        issue = outcome.issue.value(),
                        actions = ?outcome.actions,
                        "task reconciled"
                    );
                    report.record_actions(&outcome.actions);
                    if let Some(warning) = duplicate_warning(&outcome) {
                        report.record_warning(outcome.task_id, warning);
                    }
                }
                Err(failure) if failure.is_run_fatal() => {
                    let message = failure.to_string();
                    report.record_failure(task.key().clone(), message.clone());
                    let aborted = phases.fail(SyncRunError::Auth {
                        message,
                        partial: None,
                    });
                    report.phases = phases.into_history();
                    info!(
                        %run_id,
                        processed = report.processed(),
                        created = report.created,
                        "sync aborted, returning the partial report"
                    );
                    return Err(aborted.with_partial(report));
                }
                Err(failure) => {
                    warn!(task_id = %task.key(), error = %failure, "task failed");
                    report.record_failure(task.key().clone(), failure.to_string());
                }
            }
        }

        phases.advance(SyncPhase::Done)?;
        report.phases = phases.into_history();
        info!(
            %run_id,
            created = report.created,
            updated = report.updated,
            closed = report.closed,
            reopened = report.reopened,
            unchanged = report.unchanged,
            errors = report.errors.len(),
            "sync finished"
        );
        Ok(report)
    }

    async fn check_connection(&self) -> Result<(), SyncRunError> {
        match self.tracker.test_connection().await {
            Ok(check) if check.success => Ok(()),
            Ok(check) => Err(SyncRunError::Connection(check.message)),
            Err(TrackerError::Auth(message)) => Err(SyncRunError::Auth {
                message,
                partial: None,
            }),
            Err(other) => Err(SyncRunError::Connection(other.to_string())),
        }
    }
}
