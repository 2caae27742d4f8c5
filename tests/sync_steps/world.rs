//! Shared world state for synchronisation BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use tasksync::sync::{
    adapters::memory::InMemoryIssueTracker,
    config::SyncConfig,
    domain::{DryRunReport, Issue, SourceContext, SyncReport},
    services::{RepositoryLocks, SourceDocument, SyncOrchestrator, SyncRunError},
};

/// Orchestrator type used by the BDD world.
pub type TestOrchestrator = SyncOrchestrator<InMemoryIssueTracker, DefaultClock>;

/// Path the scenario task file pretends to live at.
pub const TASK_FILE: &str = ".kiro/specs/x/tasks.md";

/// Scenario world for synchronisation behaviour tests.
pub struct SyncWorld {
    pub tracker: InMemoryIssueTracker,
    pub orchestrator: TestOrchestrator,
    pub document: Option<SourceDocument>,
    pub last_run: Option<Result<SyncReport, SyncRunError>>,
    pub last_plan: Option<DryRunReport>,
}

impl SyncWorld {
    /// Creates a world backed by an empty in-memory tracker.
    #[must_use]
    pub fn new() -> Self {
        let tracker = InMemoryIssueTracker::new();
        let orchestrator = SyncOrchestrator::new(
            SyncConfig::for_repository("acme/platform"),
            Arc::new(tracker.clone()),
            Arc::new(DefaultClock),
            RepositoryLocks::new(),
        );
        Self {
            tracker,
            orchestrator,
            document: None,
            last_run: None,
            last_plan: None,
        }
    }

    /// Stores `markdown` as the scenario task file.
    pub fn set_document(&mut self, markdown: &str) -> Result<(), eyre::Report> {
        let context = SourceContext::from_path(TASK_FILE)?;
        self.document = Some(SourceDocument::new(context, markdown));
        Ok(())
    }

    /// Returns the scenario task file.
    pub fn document(&self) -> Result<&SourceDocument, eyre::Report> {
        self.document
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task file in scenario world"))
    }

    /// Returns the issue carrying the identity label of `task_id`.
    pub fn issue_for(&self, task_id: &str) -> Result<Issue, eyre::Report> {
        let label = format!("task:{task_id}");
        self.tracker
            .issues()?
            .into_iter()
            .find(|issue| issue.labels.contains(&label))
            .ok_or_else(|| eyre::eyre!("no issue labelled {label}"))
    }

    /// Returns the report of the last successful run.
    pub fn report(&self) -> Result<&SyncReport, eyre::Report> {
        self.last_run
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing run result in scenario world"))?
            .as_ref()
            .map_err(|err| eyre::eyre!("unexpected run failure: {err}"))
    }
}

impl Default for SyncWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> SyncWorld {
    SyncWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
