//! Unit tests for dry-run and live orchestration.

use std::sync::Arc;
use std::time::Duration;

use super::support::document;
use crate::sync::{
    adapters::memory::{InMemoryIssueTracker, TrackerOperation},
    config::SyncConfig,
    domain::{
        Issue, IssueNumber, IssueState, LabelSet, RepositoryFullName, SyncPhase, TaskKey,
    },
    ports::{ConnectionCheck, IssueTracker, TrackerError, TrackerResult},
    services::{CancellationFlag, RepositoryLocks, SyncOrchestrator, SyncRunError},
};
use async_trait::async_trait;
use eyre::{Result, ensure, eyre};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

const CHECKLIST: &str = "\
## Phase 1: Foundation

- [x] 1. Setup workspace
- [-] 2. Database migrations
  - Create the schema
  - _Requirements: 2.1_
- [ ] 3. Tenant API
- [ ] 4 Malformed line without period
- [ ] 14. User profile frontend
";

#[fixture]
fn config() -> SyncConfig {
    SyncConfig::for_repository("acme/platform")
}

fn orchestrator_for<T: IssueTracker>(
    config: SyncConfig,
    tracker: T,
    locks: RepositoryLocks,
) -> SyncOrchestrator<T, DefaultClock> {
    SyncOrchestrator::new(config, Arc::new(tracker), Arc::new(DefaultClock), locks)
}

fn repository() -> RepositoryFullName {
    RepositoryFullName::new("acme/platform").expect("valid repository")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_and_live_run_agree(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());
    let checklist = document(CHECKLIST);

    let plan = orchestrator.dry_run(&checklist)?;
    ensure!(tracker.calls()?.is_empty(), "dry run must not call the tracker");
    let report = orchestrator.run(&checklist, &CancellationFlag::new()).await?;

    ensure!(plan.total_tasks == 4);
    ensure!(report.total_tasks == plan.total_tasks);
    ensure!(report.analysis == plan.analysis);
    ensure!(report.skipped_lines == plan.skipped_lines);
    ensure!(plan.skipped_lines.len() == 1);
    ensure!(plan.analysis.by_phase.get("1-2") == Some(&3));
    ensure!(plan.analysis.by_phase.get("4") == Some(&1));
    ensure!(plan.analysis.by_status.get("not_started") == Some(&2));
    ensure!(plan.analysis.by_component.get("database") == Some(&1));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn live_run_reports_counts_and_phases(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());

    let report = orchestrator
        .run(&document(CHECKLIST), &CancellationFlag::new())
        .await?;

    ensure!(report.created == 4);
    ensure!(report.closed == 1);
    ensure!(report.updated == 0);
    ensure!(report.errors.is_empty());
    ensure!(report.succeeded() == 4);
    ensure!(!report.cancelled);
    ensure!(
        report.phases
            == vec![
                SyncPhase::Idle,
                SyncPhase::Parsing,
                SyncPhase::Reconciling,
                SyncPhase::Done
            ]
    );
    ensure!(tracker.issues()?.len() == 4);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_run_performs_no_mutations(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());
    let checklist = document(CHECKLIST);
    orchestrator.run(&checklist, &CancellationFlag::new()).await?;
    let mutations = tracker.mutation_count()?;

    let second = orchestrator.run(&checklist, &CancellationFlag::new()).await?;

    ensure!(second.mutation_count() == 0);
    ensure!(second.unchanged == 4);
    ensure!(tracker.mutation_count()? == mutations);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_ids_keep_the_last_occurrence(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());
    let checklist = document("- [ ] 1. First draft\n- [ ] 2. Other\n- [x] 1. Final wording\n");

    let report = orchestrator.run(&checklist, &CancellationFlag::new()).await?;

    ensure!(report.total_tasks == 2);
    ensure!(report.duplicate_ids == vec![TaskKey::new("1")?]);
    let issues = tracker.issues()?;
    let first = issues
        .iter()
        .find(|issue| issue.labels.contains("task:1"))
        .ok_or_else(|| eyre!("issue for task 1"))?;
    ensure!(first.title.ends_with("1: Final wording"));
    ensure!(first.state == IssueState::Closed);
    ensure!(issues.len() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn per_task_failures_do_not_stop_the_batch(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    tracker.fail_lookups_of("task:2", TrackerError::Network("connection reset".to_owned()))?;
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());

    let report = orchestrator
        .run(&document(CHECKLIST), &CancellationFlag::new())
        .await?;

    ensure!(report.errors.len() == 1);
    let failure = report.errors.first().ok_or_else(|| eyre!("one failure"))?;
    ensure!(failure.task_id.as_str() == "2");
    ensure!(failure.message.contains("connection reset"));
    ensure!(report.created == 3);
    ensure!(report.succeeded() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auth_failure_aborts_the_run(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    tracker.fail_next(
        TrackerOperation::Create,
        TrackerError::Auth("token revoked".to_owned()),
    )?;
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());

    let result = orchestrator
        .run(&document(CHECKLIST), &CancellationFlag::new())
        .await;

    ensure!(matches!(result, Err(SyncRunError::Auth { .. })));
    ensure!(tracker.mutation_count()? == 1, "only the rejected create was attempted");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auth_failure_mid_run_keeps_the_partial_report(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    tracker.fail_lookups_of("task:2", TrackerError::Auth("token revoked".to_owned()))?;
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());

    let result = orchestrator
        .run(&document(CHECKLIST), &CancellationFlag::new())
        .await;

    let Err(error) = result else {
        return Err(eyre!("run should abort on revoked credentials"));
    };
    ensure!(matches!(error, SyncRunError::Auth { .. }));
    let partial = error
        .partial_report()
        .ok_or_else(|| eyre!("mid-run abort should carry a partial report"))?;
    ensure!(partial.created == 1);
    ensure!(partial.closed == 1);
    ensure!(partial.processed() == 2);
    let failure = partial.errors.first().ok_or_else(|| eyre!("one failure"))?;
    ensure!(failure.task_id.as_str() == "2");
    ensure!(partial.phases.last() == Some(&SyncPhase::Failed));
    ensure!(partial.to_string().contains("created 1"));
    ensure!(tracker.issues()?.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auth_failure_at_connection_check_has_no_partial_report(
    config: SyncConfig,
) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    tracker.set_connection(Err(TrackerError::Auth("bad credentials".to_owned())))?;
    let orchestrator = orchestrator_for(config, tracker, RepositoryLocks::new());

    let result = orchestrator
        .run(&document(CHECKLIST), &CancellationFlag::new())
        .await;

    let Err(error) = result else {
        return Err(eyre!("run should fail the connection check"));
    };
    ensure!(matches!(error, SyncRunError::Auth { .. }));
    ensure!(error.partial_report().is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn issues_sharing_an_identity_label_are_reported(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let labels: LabelSet = ["task:1"].into_iter().collect();
    let older = tracker.seed_issue("old", "old body", IssueState::Open, labels.clone())?;
    let newer = tracker.seed_issue("new", "new body", IssueState::Open, labels)?;
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());

    let report = orchestrator
        .run(&document("- [ ] 1. Setup workspace
"), &CancellationFlag::new())
        .await?;

    ensure!(report.created == 0);
    ensure!(report.updated == 1);
    let warning = report.warnings.first().ok_or_else(|| eyre!("one warning"))?;
    ensure!(report.warnings.len() == 1);
    ensure!(warning.task_id.as_str() == "1");
    ensure!(warning.message.contains(&format!("#{}", older.value())));
    ensure!(report.to_string().contains("warning [1]"));
    let issues = tracker.issues()?;
    let untouched = issues
        .iter()
        .find(|issue| issue.number == older)
        .ok_or_else(|| eyre!("older issue"))?;
    ensure!(untouched.title == "old");
    let refreshed = issues
        .iter()
        .find(|issue| issue.number == newer)
        .ok_or_else(|| eyre!("newer issue"))?;
    ensure!(refreshed.title.ends_with("1: Setup workspace"));
    Ok(())
}

#[rstest]
#[case(Ok(ConnectionCheck::failed("repository archived")))]
#[case(Err(TrackerError::Network("dns failure".to_owned())))]
#[tokio::test(flavor = "multi_thread")]
async fn failed_connection_check_stops_before_reconciling(
    config: SyncConfig,
    #[case] check: TrackerResult<ConnectionCheck>,
) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    tracker.set_connection(check)?;
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());

    let result = orchestrator
        .run(&document(CHECKLIST), &CancellationFlag::new())
        .await;

    ensure!(matches!(result, Err(SyncRunError::Connection(_))));
    ensure!(tracker.calls()? == vec![TrackerOperation::TestConnection]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_config_fails_before_any_call() -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(
        SyncConfig::for_repository("not-a-repo"),
        tracker.clone(),
        RepositoryLocks::new(),
    );
    let checklist = document(CHECKLIST);

    ensure!(matches!(orchestrator.dry_run(&checklist), Err(SyncRunError::Config(_))));
    let result = orchestrator.run(&checklist, &CancellationFlag::new()).await;

    ensure!(matches!(result, Err(SyncRunError::Config(_))));
    ensure!(tracker.calls()?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn raised_flag_stops_before_the_first_task(config: SyncConfig) -> Result<()> {
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(config, tracker.clone(), RepositoryLocks::new());
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let report = orchestrator.run(&document(CHECKLIST), &cancel).await?;

    ensure!(report.cancelled);
    ensure!(report.processed() == 0);
    ensure!(tracker.mutation_count()? == 0);
    Ok(())
}

/// Tracker that raises a cancellation flag once the first issue exists.
struct CancelAfterCreate {
    inner: InMemoryIssueTracker,
    cancel: CancellationFlag,
}

#[async_trait]
impl IssueTracker for CancelAfterCreate {
    async fn find_issues_by_label(&self, label: &str) -> TrackerResult<Vec<Issue>> {
        self.inner.find_issues_by_label(label).await
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &LabelSet,
    ) -> TrackerResult<Issue> {
        let created = self.inner.create_issue(title, body, labels).await;
        self.cancel.cancel();
        created
    }

    async fn update_issue(
        &self,
        number: IssueNumber,
        title: &str,
        body: &str,
    ) -> TrackerResult<()> {
        self.inner.update_issue(number, title, body).await
    }

    async fn update_issue_labels(
        &self,
        number: IssueNumber,
        labels: &LabelSet,
    ) -> TrackerResult<()> {
        self.inner.update_issue_labels(number, labels).await
    }

    async fn close_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        self.inner.close_issue(number).await
    }

    async fn reopen_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        self.inner.reopen_issue(number).await
    }

    async fn test_connection(&self) -> TrackerResult<ConnectionCheck> {
        self.inner.test_connection().await
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancellation_finishes_the_in_flight_task(config: SyncConfig) -> Result<()> {
    let inner = InMemoryIssueTracker::new();
    let cancel = CancellationFlag::new();
    let tracker = CancelAfterCreate {
        inner: inner.clone(),
        cancel: cancel.clone(),
    };
    let orchestrator = orchestrator_for(config, tracker, RepositoryLocks::new());

    let report = orchestrator.run(&document(CHECKLIST), &cancel).await?;

    ensure!(report.cancelled);
    ensure!(report.processed() == 1);
    ensure!(report.created == 1);
    ensure!(report.closed == 1, "the completed task is closed before stopping");
    let issues = inner.issues()?;
    ensure!(issues.len() == 1);
    ensure!(issues.iter().all(|issue| issue.state == IssueState::Closed));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn try_run_rejects_a_held_repository(config: SyncConfig) -> Result<()> {
    let locks = RepositoryLocks::new();
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = orchestrator_for(config, tracker.clone(), locks.clone());
    let held = locks
        .try_acquire(&repository())
        .ok_or_else(|| eyre!("lock should be free"))?;

    let result = orchestrator
        .try_run(&document(CHECKLIST), &CancellationFlag::new())
        .await;

    ensure!(matches!(result, Err(SyncRunError::Busy(_))));
    ensure!(tracker.calls()?.is_empty());
    drop(held);
    ensure!(!locks.is_locked(&repository()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn run_waits_for_the_active_run(config: SyncConfig) -> Result<()> {
    let locks = RepositoryLocks::new();
    let tracker = InMemoryIssueTracker::new();
    let orchestrator = Arc::new(orchestrator_for(config, tracker.clone(), locks.clone()));
    let held = locks
        .try_acquire(&repository())
        .ok_or_else(|| eyre!("lock should be free"))?;

    let queued = tokio::spawn({
        let queued_orchestrator = Arc::clone(&orchestrator);
        async move {
            queued_orchestrator
                .run(&document(CHECKLIST), &CancellationFlag::new())
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    ensure!(!queued.is_finished(), "run must wait for the lock");
    ensure!(tracker.calls()?.is_empty());

    drop(held);
    let report = queued.await??;

    ensure!(report.created == 4);
    ensure!(!locks.is_locked(&repository()));
    Ok(())
}
