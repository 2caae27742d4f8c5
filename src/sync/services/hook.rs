//! File-change hook that previews and applies syncs.

use super::{CancellationFlag, SourceDocument, SyncOrchestrator, SyncRunError};
use crate::sync::{
    domain::{DryRunReport, RepositoryFullName, SourceContext, SyncDomainError, SyncReport},
    ports::{ConfirmationError, ConfirmationPrompt, IssueTracker, TaskSource, TaskSourceError},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

const TASK_FILE_EXTENSION: &str = "md";

/// Kind of change reported for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// The file was created.
    Created,
    /// The file was modified.
    Modified,
    /// The file was deleted.
    Deleted,
}

/// A file-change notification from an editor or watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    /// Changed file.
    pub file_path: Utf8PathBuf,
    /// Kind of change.
    pub change_type: ChangeType,
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

/// Whether a live run needs operator approval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HookMode {
    /// Ask the confirmation prompt after the dry run.
    #[default]
    Interactive,
    /// Apply straight after the dry run.
    Automatic,
}

/// What to do when a run for the same repository is already active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// Cancel the active run and wait for it to release the repository.
    #[default]
    Queue,
    /// Leave the active run alone and reject this trigger.
    Reject,
}

/// Result of handling one file-change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Sync is disabled in the configuration.
    Disabled,
    /// The event does not concern a task file.
    Ignored,
    /// The file content matches the last successful sync.
    Unchanged,
    /// The operator declined the planned changes.
    Declined(DryRunReport),
    /// Another run holds the repository.
    Rejected,
    /// A live run completed.
    Synced(SyncReport),
}

/// Hook failures.
#[derive(Debug, Clone, Error)]
pub enum HookError {
    /// The changed file could not be read.
    #[error(transparent)]
    Source(#[from] TaskSourceError),

    /// No spec name could be derived for the changed file.
    #[error(transparent)]
    Domain(#[from] SyncDomainError),

    /// The confirmation prompt failed.
    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    /// The dry run or live run failed.
    #[error(transparent)]
    Run(#[from] SyncRunError),
}

/// Reacts to task file changes with a dry run, confirmation, and live run.
pub struct HookService<T, C>
where
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    orchestrator: SyncOrchestrator<T, C>,
    source: Arc<dyn TaskSource>,
    prompt: Arc<dyn ConfirmationPrompt>,
    mode: HookMode,
    policy: ConcurrencyPolicy,
    synced_digests: Mutex<HashMap<Utf8PathBuf, Vec<u8>>>,
    active_runs: Mutex<HashMap<RepositoryFullName, CancellationFlag>>,
}

impl<T, C> HookService<T, C>
where
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    /// Creates an interactive hook with the queueing policy.
    #[must_use]
    pub fn new(
        orchestrator: SyncOrchestrator<T, C>,
        source: Arc<dyn TaskSource>,
        prompt: Arc<dyn ConfirmationPrompt>,
    ) -> Self {
        Self {
            orchestrator,
            source,
            prompt,
            mode: HookMode::default(),
            policy: ConcurrencyPolicy::default(),
            synced_digests: Mutex::new(HashMap::new()),
            active_runs: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the confirmation mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: HookMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the concurrency policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handles one file-change event.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] when the file cannot be read, the prompt fails,
    /// or the run fails at run level.
    pub async fn handle(&self, event: &FileChangeEvent) -> Result<HookOutcome, HookError> {
        let config = self.orchestrator.config();
        if !config.enabled {
            debug!(path = %event.file_path, "sync disabled, ignoring change");
            return Ok(HookOutcome::Disabled);
        }
        if event.change_type == ChangeType::Deleted
            || event.file_path.extension() != Some(TASK_FILE_EXTENSION)
        {
            debug!(path = %event.file_path, change = ?event.change_type, "not a task file change");
            return Ok(HookOutcome::Ignored);
        }

        let contents = self.source.read_to_string(&event.file_path).await?;
        let digest = Sha256::digest(contents.as_bytes()).to_vec();
        if self.last_synced_digest(&event.file_path).as_ref() == Some(&digest) {
            debug!(path = %event.file_path, "content unchanged since last sync");
            return Ok(HookOutcome::Unchanged);
        }

        let document = SourceDocument::new(
            SourceContext::from_path(event.file_path.clone())?,
            contents,
        );
        let plan = self.orchestrator.dry_run(&document)?;
        info!(path = %event.file_path, planned = plan.total_tasks, "sync planned");

        if self.mode == HookMode::Interactive && !self.prompt.confirm(&plan).await? {
            info!(path = %event.file_path, "sync declined");
            return Ok(HookOutcome::Declined(plan));
        }

        let repository = config.validate().map_err(SyncRunError::from)?;
        let flag = CancellationFlag::new();
        let outcome = match self.policy {
            ConcurrencyPolicy::Queue => {
                self.supersede(&repository, &flag);
                self.orchestrator.run(&document, &flag).await
            }
            ConcurrencyPolicy::Reject => {
                self.register(&repository, &flag);
                self.orchestrator.try_run(&document, &flag).await
            }
        };
        self.release(&repository, &flag);

        match outcome {
            Ok(report) => {
                if !report.cancelled && report.errors.is_empty() {
                    self.remember_digest(event.file_path.clone(), digest);
                }
                Ok(HookOutcome::Synced(report))
            }
            Err(SyncRunError::Busy(busy)) => {
                info!(repository = %busy, "sync already running, trigger rejected");
                Ok(HookOutcome::Rejected)
            }
            Err(failure) => Err(failure.into()),
        }
    }

    fn last_synced_digest(&self, path: &Utf8Path) -> Option<Vec<u8>> {
        self.synced_digests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn remember_digest(&self, path: Utf8PathBuf, digest: Vec<u8>) {
        self.synced_digests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, digest);
    }

    /// Installs `flag` as the active run and cancels the one it replaces.
    fn supersede(&self, repository: &RepositoryFullName, flag: &CancellationFlag) {
        let mut active = self.active_runs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.insert(repository.clone(), flag.clone()) {
            info!(%repository, "superseding active sync");
            previous.cancel();
        }
    }

    /// Installs `flag` as the active run unless one is already registered.
    fn register(&self, repository: &RepositoryFullName, flag: &CancellationFlag) {
        let mut active = self.active_runs.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .entry(repository.clone())
            .or_insert_with(|| flag.clone());
    }

    fn release(&self, repository: &RepositoryFullName, flag: &CancellationFlag) {
        let mut active = self.active_runs.lock().unwrap_or_else(PoisonError::into_inner);
        if active
            .get(repository)
            .is_some_and(|current| current.same_flag(flag))
        {
            active.remove(repository);
        }
    }
}
