//! Confirmation port consulted between a dry run and a live run.

use crate::sync::domain::DryRunReport;
use async_trait::async_trait;
use thiserror::Error;

/// Asks an operator whether a planned sync should be applied.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// Presents `plan` and returns `true` when the operator approves it.
    async fn confirm(&self, plan: &DryRunReport) -> Result<bool, ConfirmationError>;
}

/// The operator could not be asked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("confirmation prompt failed: {0}")]
pub struct ConfirmationError(pub String);
