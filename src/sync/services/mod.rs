//! Application services for task synchronisation.

mod cancel;
mod hook;
mod lock;
mod orchestrator;
mod reconcile;

pub use cancel::CancellationFlag;
pub use hook::{
    ChangeType, ConcurrencyPolicy, FileChangeEvent, HookError, HookMode, HookOutcome, HookService,
};
pub use lock::{RepositoryLocks, RunGuard};
pub use orchestrator::{
    PreparedTasks, SourceDocument, SyncOrchestrator, SyncRunError, dry_run, prepare_tasks,
};
pub use reconcile::{
    CreateRetry, IssueTransition, ReconcileError, ReconcilePlan, ReconciliationService,
    TaskOutcome, plan_reconciliation,
};
