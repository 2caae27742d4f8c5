//! Port contracts for task synchronisation.
//!
//! Ports define infrastructure-agnostic interfaces used by sync services.

pub mod confirm;
pub mod source;
pub mod tracker;

#[cfg(test)]
pub use confirm::MockConfirmationPrompt;
pub use confirm::{ConfirmationError, ConfirmationPrompt};
pub use source::{TaskSource, TaskSourceError, TaskSourceResult};
pub use tracker::{ConnectionCheck, IssueTracker, TrackerError, TrackerErrorKind, TrackerResult};
