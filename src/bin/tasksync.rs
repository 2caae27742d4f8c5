//! Synchronises a markdown task checklist with GitHub issues.
//!
//! Usage:
//!
//! ```text
//! tasksync --file .kiro/specs/platform/tasks.md [--dry-run] [--auto]
//!          [--config .kiro/github-sync.json] [--spec platform]
//! ```
//!
//! The token is read from `GITHUB_TOKEN`. Without `--auto` the planned
//! changes are shown and confirmed before anything is written. The process
//! exits with status 1 only for run-level failures; per-task errors are
//! listed in the summary and still exit 0.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use mockable::DefaultClock;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tasksync::sync::{
    adapters::{
        console::DialoguerPrompt,
        fs::CapStdTaskSource,
        github::GitHubIssueTracker,
        retry::{RetryPolicy, RetryingTracker},
    },
    config::{ConfigError, SyncConfig},
    domain::SpecName,
    ports::{ConfirmationError, ConfirmationPrompt},
    services::{
        CancellationFlag, RepositoryLocks, SourceDocument, SyncOrchestrator, SyncRunError, dry_run,
    },
};
use thiserror::Error;
use tokio::runtime::Builder;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_CONFIG_PATH: &str = ".kiro/github-sync.json";

#[derive(Debug, Parser)]
#[command(name = "tasksync", version, about = "Sync task checklists to GitHub issues")]
struct Cli {
    /// Markdown task file to synchronise.
    #[arg(long)]
    file: Utf8PathBuf,

    /// Show what would change without contacting GitHub.
    #[arg(long)]
    dry_run: bool,

    /// Apply changes without asking for confirmation.
    #[arg(long)]
    auto: bool,

    /// Sync configuration file (JSON, or TOML by extension).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: Utf8PathBuf,

    /// Spec name override; defaults to the task file's directory name.
    #[arg(long)]
    spec: Option<String>,

    /// Repository override in owner/repo form.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// GitHub token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] SyncRunError),
    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),
    #[error("invalid --spec: {0}")]
    Spec(String),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Loads the config file, falling back to defaults when it does not exist.
fn load_config(path: &Utf8Path, repository: Option<String>) -> Result<SyncConfig, ConfigError> {
    let loaded = match SyncConfig::load(path) {
        Ok(config) => config,
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            info!(%path, "no config file, using defaults");
            SyncConfig::default()
        }
        Err(other) => return Err(other),
    };
    Ok(match repository {
        Some(name) => SyncConfig {
            repository: name,
            ..loaded
        },
        None => loaded,
    })
}

fn print(text: &str) {
    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{text}").is_err() {
        error!("failed to write to stdout");
    }
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.config, cli.repository)?;
    let spec_override = cli
        .spec
        .map(SpecName::new)
        .transpose()
        .map_err(|err| CliError::Spec(err.to_string()))?;
    let document =
        SourceDocument::load(&CapStdTaskSource::new(), &cli.file, spec_override).await?;

    if cli.dry_run {
        let plan = dry_run(&config, &document)?;
        print(&plan.to_string());
        return Ok(());
    }

    let token = cli.token.ok_or(ConfigError::MissingToken)?;
    let tracker = RetryingTracker::new(
        GitHubIssueTracker::new(&config, token)?,
        RetryPolicy::from_config(&config),
    );
    let orchestrator = SyncOrchestrator::new(
        config,
        Arc::new(tracker),
        Arc::new(DefaultClock),
        RepositoryLocks::new(),
    );

    if !cli.auto {
        let plan = orchestrator.dry_run(&document)?;
        if !DialoguerPrompt::new().confirm(&plan).await? {
            print("Sync cancelled; no changes were made.");
            return Ok(());
        }
    }

    match orchestrator.run(&document, &CancellationFlag::new()).await {
        Ok(report) => {
            print(&report.to_string());
            Ok(())
        }
        Err(failure) => {
            if let Some(partial) = failure.partial_report() {
                print(&partial.to_string());
            }
            Err(failure.into())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::from)
        .and_then(|runtime| runtime.block_on(execute(cli)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "tasksync failed");
            ExitCode::FAILURE
        }
    }
}
