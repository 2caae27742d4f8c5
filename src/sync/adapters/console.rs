//! Terminal confirmation prompt.

use async_trait::async_trait;
use dialoguer::Confirm;
use std::io::Write;

use crate::sync::{
    domain::DryRunReport,
    ports::{ConfirmationError, ConfirmationPrompt},
};

/// Prints the dry-run plan to stdout and asks for a yes/no answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPrompt;

impl DialoguerPrompt {
    /// Creates a terminal prompt.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn ask(summary: &str, planned: usize) -> Result<bool, ConfirmationError> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{summary}").map_err(|err| ConfirmationError(err.to_string()))?;
    stdout
        .flush()
        .map_err(|err| ConfirmationError(err.to_string()))?;
    drop(stdout);

    Confirm::new()
        .with_prompt(format!("Apply changes for {planned} tasks?"))
        .default(false)
        .interact()
        .map_err(|err| ConfirmationError(err.to_string()))
}

#[async_trait]
impl ConfirmationPrompt for DialoguerPrompt {
    async fn confirm(&self, plan: &DryRunReport) -> Result<bool, ConfirmationError> {
        let summary = plan.to_string();
        let planned = plan.total_tasks;
        tokio::task::spawn_blocking(move || ask(&summary, planned))
            .await
            .map_err(|err| ConfirmationError(err.to_string()))?
    }
}
