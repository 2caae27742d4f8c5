//! Per-task reconciliation of a task with its tracker issue.

use crate::sync::{
    config::SyncConfig,
    domain::{
        ContentViolation, Issue, IssueContent, IssueNumber, IssueState, SyncAction,
        SyncDomainError, Task, TaskKey, TaskStatus, identity_label, render_issue,
    },
    ports::{IssueTracker, TrackerError, TrackerErrorKind},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounds for re-attempting issue creation after a transient failure.
///
/// Each retry waits, then looks the identity label up again, and only
/// creates when the earlier attempt did not land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateRetry {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Upper bound for one wait.
    pub max_delay: Duration,
}

impl CreateRetry {
    /// Never retries.
    pub const NEVER: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    /// Builds the bounds described by `config`.
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay(),
            max_delay: config.max_backoff(),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Open/closed change applied after the content update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueTransition {
    /// The issue state already matches the task status.
    Keep,
    /// The issue must be closed.
    Close,
    /// The issue must be reopened.
    Reopen,
}

/// Mutations needed to bring one issue in line with its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// No issue exists yet.
    Create {
        /// Close the issue straight after creation.
        close_after: bool,
    },
    /// An issue exists and may need refreshing.
    Update {
        /// Title or body differ.
        refresh_text: bool,
        /// The label set differs.
        refresh_labels: bool,
        /// State change to apply afterwards.
        transition: IssueTransition,
    },
}

impl ReconcilePlan {
    /// Returns `true` when applying the plan writes nothing.
    #[must_use]
    pub const fn is_noop(self) -> bool {
        matches!(
            self,
            Self::Update {
                refresh_text: false,
                refresh_labels: false,
                transition: IssueTransition::Keep,
            }
        )
    }
}

/// Decides what to do for one task.
///
/// | Existing issue | Task status   | Issue state | Plan                  |
/// |----------------|---------------|-------------|-----------------------|
/// | none           | any           |             | create, close if done |
/// | some           | completed     | open        | refresh, close        |
/// | some           | completed     | closed      | refresh               |
/// | some           | not completed | closed      | refresh, reopen       |
/// | some           | not completed | open        | refresh               |
///
/// "Refresh" only writes the parts that actually differ.
#[must_use]
pub fn plan_reconciliation(
    existing: Option<&Issue>,
    content: &IssueContent,
    status: TaskStatus,
) -> ReconcilePlan {
    let Some(issue) = existing else {
        return ReconcilePlan::Create {
            close_after: status.is_completed(),
        };
    };
    let transition = match (status.is_completed(), issue.state) {
        (true, IssueState::Open) => IssueTransition::Close,
        (false, IssueState::Closed) => IssueTransition::Reopen,
        _ => IssueTransition::Keep,
    };
    ReconcilePlan::Update {
        refresh_text: content.text_differs_from(issue),
        refresh_labels: content.labels_differ_from(issue),
        transition,
    }
}

/// Errors raised while reconciling one task.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The rendered content exceeds tracker limits; the task is skipped.
    #[error("content rejected: {0}")]
    Validation(ContentViolation),

    /// The issue content could not be rendered.
    #[error(transparent)]
    Render(#[from] SyncDomainError),

    /// A tracker call failed.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl ReconcileError {
    /// Returns `true` when the failure must stop the whole run.
    #[must_use]
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Tracker(error) if error.kind() == TrackerErrorKind::Auth)
    }
}

/// Result of reconciling one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Task identifier.
    pub task_id: TaskKey,
    /// Issue mirroring the task.
    pub issue: IssueNumber,
    /// Mutations applied, empty when the issue already matched.
    pub actions: Vec<SyncAction>,
    /// Older issues also carrying the identity label, left untouched.
    pub duplicate_issues: Vec<IssueNumber>,
}

/// Reconciles tasks with tracker issues one at a time.
#[derive(Clone)]
pub struct ReconciliationService<T, C>
where
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    tracker: Arc<T>,
    clock: Arc<C>,
    label_prefix: String,
    create_retry: CreateRetry,
}

impl<T, C> ReconciliationService<T, C>
where
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    /// Creates a reconciliation service that never retries creation.
    #[must_use]
    pub fn new(tracker: Arc<T>, clock: Arc<C>, label_prefix: impl Into<String>) -> Self {
        Self {
            tracker,
            clock,
            label_prefix: label_prefix.into(),
            create_retry: CreateRetry::NEVER,
        }
    }

    /// Sets the bounds for retrying issue creation.
    #[must_use]
    pub const fn with_create_retry(mut self, create_retry: CreateRetry) -> Self {
        self.create_retry = create_retry;
        self
    }

    /// Brings the issue for `task` in line with the task.
    ///
    /// Content is validated before any tracker call, so an oversized task
    /// never reaches the network. A lookup answering `NotFound` is treated
    /// as "no issue yet". When several issues carry the identity label the
    /// newest is reconciled and the others are listed in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when rendering, validation, or a tracker
    /// call fails. Mutations applied before the failure are not rolled back.
    pub async fn reconcile(&self, task: &Task) -> Result<TaskOutcome, ReconcileError> {
        let content = render_issue(task, &self.label_prefix, &*self.clock)?;
        content.validate().map_err(ReconcileError::Validation)?;

        let identity = identity_label(&self.label_prefix, task.key());
        let mut matches = self.lookup(&identity).await?.into_iter();
        let existing = matches.next();
        let duplicate_issues: Vec<IssueNumber> = matches.map(|issue| issue.number).collect();
        if !duplicate_issues.is_empty() {
            warn!(
                task_id = %task.key(),
                label = identity,
                duplicates = ?duplicate_issues,
                "more than one issue carries the identity label, using the newest"
            );
        }

        let plan = plan_reconciliation(existing.as_ref(), &content, task.status());
        debug!(task_id = %task.key(), ?plan, "reconciliation planned");

        let (issue, actions) = match existing {
            None => self.create(&identity, &content, plan).await?,
            Some(found) => {
                let actions = self.update(&found, &content, plan).await?;
                (found.number, actions)
            }
        };

        Ok(TaskOutcome {
            task_id: task.key().clone(),
            issue,
            actions,
            duplicate_issues,
        })
    }

    async fn lookup(&self, identity: &str) -> Result<Vec<Issue>, TrackerError> {
        match self.tracker.find_issues_by_label(identity).await {
            Ok(found) => Ok(found),
            Err(TrackerError::NotFound(_)) => Ok(Vec::new()),
            Err(error) => Err(error),
        }
    }

    /// Creates the issue, retrying transient failures only after a lookup
    /// shows the earlier attempt did not land.
    async fn create_with_retry(
        &self,
        identity: &str,
        content: &IssueContent,
    ) -> Result<Issue, ReconcileError> {
        let mut attempt: u32 = 0;
        loop {
            let error = match self
                .tracker
                .create_issue(&content.title, &content.body, &content.labels)
                .await
            {
                Ok(issue) => return Ok(issue),
                Err(failure) => failure,
            };
            if !error.is_transient() || attempt >= self.create_retry.max_retries {
                return Err(error.into());
            }

            let delay = self.create_retry.delay_for(attempt);
            warn!(
                label = identity,
                attempt = attempt + 1,
                delay_ms = delay.as_millis(),
                error = %error,
                "issue creation failed, checking whether it landed before retrying"
            );
            tokio::time::sleep(delay).await;
            if let Some(landed) = self.lookup(identity).await?.into_iter().next() {
                debug!(label = identity, issue = landed.number.value(), "earlier create landed");
                return Ok(landed);
            }
            attempt += 1;
        }
    }

    async fn create(
        &self,
        identity: &str,
        content: &IssueContent,
        plan: ReconcilePlan,
    ) -> Result<(IssueNumber, Vec<SyncAction>), ReconcileError> {
        let issue = self.create_with_retry(identity, content).await?;
        let mut actions = vec![SyncAction::Created];
        if matches!(plan, ReconcilePlan::Create { close_after: true })
            && issue.state == IssueState::Open
        {
            self.tracker.close_issue(issue.number).await?;
            actions.push(SyncAction::Closed);
        }
        Ok((issue.number, actions))
    }

    async fn update(
        &self,
        issue: &Issue,
        content: &IssueContent,
        plan: ReconcilePlan,
    ) -> Result<Vec<SyncAction>, ReconcileError> {
        let ReconcilePlan::Update {
            refresh_text,
            refresh_labels,
            transition,
        } = plan
        else {
            return Ok(Vec::new());
        };

        let mut actions = Vec::new();
        if refresh_text {
            self.tracker
                .update_issue(issue.number, &content.title, &content.body)
                .await?;
        }
        if refresh_labels {
            self.tracker
                .update_issue_labels(issue.number, &content.labels)
                .await?;
        }
        if refresh_text || refresh_labels {
            actions.push(SyncAction::Updated);
        }
        match transition {
            IssueTransition::Close => {
                self.tracker.close_issue(issue.number).await?;
                actions.push(SyncAction::Closed);
            }
            IssueTransition::Reopen => {
                self.tracker.reopen_issue(issue.number).await?;
                actions.push(SyncAction::Reopened);
            }
            IssueTransition::Keep => {}
        }
        Ok(actions)
    }
}
