//! Sync run identity and lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a sync run.
///
/// ```text
/// Idle -> Parsing -> DryRunReport -> Done
///                 \-> Reconciling -> Done
/// Idle | Parsing | Reconciling -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// The run has not started.
    Idle,
    /// The task source is being parsed.
    Parsing,
    /// A dry-run analysis is being assembled.
    DryRunReport,
    /// Tasks are being reconciled against the tracker.
    Reconciling,
    /// The run finished; per-task errors may still have been recorded.
    Done,
    /// The run stopped on a run-level error.
    Failed,
}

impl SyncPhase {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::DryRunReport => "dry_run_report",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` when the run can move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Parsing | Self::Failed)
                | (
                    Self::Parsing,
                    Self::DryRunReport | Self::Reconciling | Self::Failed
                )
                | (Self::DryRunReport, Self::Done)
                | (Self::Reconciling, Self::Done | Self::Failed)
        )
    }

    /// Returns `true` for [`SyncPhase::Done`] and [`SyncPhase::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
