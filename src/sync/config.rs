//! Sync configuration.
//!
//! Configuration is an explicit value handed to the orchestrator; nothing
//! reads it from global state. Files use camelCase keys and are parsed as
//! TOML when the extension is `.toml` and as JSON otherwise:
//!
//! ```json
//! {
//!   "enabled": true,
//!   "repository": "acme/platform",
//!   "labelPrefix": "task:",
//!   "apiUrl": "https://api.github.com",
//!   "maxRetries": 3,
//!   "retryDelay_ms": 1000,
//!   "rateLimitBuffer": 100
//! }
//! ```

use crate::sync::domain::{RepositoryFullName, SyncDomainError};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LABEL_PREFIX: &str = "task:";
const DEFAULT_API_URL: &str = "https://api.github.com";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that failed.
        path: String,
        /// Underlying failure.
        source: Arc<std::io::Error>,
    },

    /// The configuration file is not valid JSON or TOML.
    #[error("failed to parse config {path}: {reason}")]
    Parse {
        /// Path that failed.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// The repository is not in `owner/repo` form.
    #[error(transparent)]
    Repository(#[from] SyncDomainError),

    /// The label prefix is blank.
    #[error("labelPrefix must not be empty")]
    EmptyLabelPrefix,

    /// The API URL is not an http(s) URL.
    #[error("apiUrl must start with http:// or https://, got '{0}'")]
    InvalidApiUrl(String),

    /// The request timeout is zero.
    #[error("requestTimeout_ms must be greater than zero")]
    ZeroRequestTimeout,

    /// No tracker credential was supplied.
    #[error("no tracker token supplied; set GITHUB_TOKEN")]
    MissingToken,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Configuration consumed by the sync services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Whether hook-triggered syncs run at all.
    pub enabled: bool,
    /// Target repository in `owner/repo` form.
    pub repository: String,
    /// Prefix of the identity label, e.g. `task:`.
    pub label_prefix: String,
    /// Tracker API base URL.
    pub api_url: String,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base delay of the exponential backoff.
    #[serde(rename = "retryDelay_ms", alias = "retryDelayMs")]
    pub retry_delay_ms: u64,
    /// Remaining-request threshold below which the client backs off.
    pub rate_limit_buffer: u32,
    /// Timeout applied to each tracker request.
    #[serde(rename = "requestTimeout_ms", alias = "requestTimeoutMs")]
    pub request_timeout_ms: u64,
    /// Upper bound for a single backoff delay.
    #[serde(rename = "maxBackoff_ms", alias = "maxBackoffMs")]
    pub max_backoff_ms: u64,
    /// Upper bound for the summed backoff of one call.
    #[serde(rename = "maxTotalBackoff_ms", alias = "maxTotalBackoffMs")]
    pub max_total_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repository: String::new(),
            label_prefix: DEFAULT_LABEL_PREFIX.to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
            max_retries: 3,
            retry_delay_ms: 1_000,
            rate_limit_buffer: 100,
            request_timeout_ms: 30_000,
            max_backoff_ms: 30_000,
            max_total_backoff_ms: 120_000,
        }
    }
}

impl SyncConfig {
    /// Creates an enabled configuration for `repository` with defaults.
    #[must_use]
    pub fn for_repository(repository: impl Into<String>) -> Self {
        Self {
            enabled: true,
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a JSON or TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when the file
    /// cannot be read or decoded. The result is not validated.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let read_error = |err: std::io::Error| ConfigError::Read {
            path: path.to_string(),
            source: Arc::new(err),
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| read_error(std::io::Error::other("path must include a file name")))?;
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let contents = dir.read_to_string(file_name).map_err(read_error)?;
        Self::from_str_with_format(&contents, path.extension() == Some("toml")).map_err(|reason| {
            ConfigError::Parse {
                path: path.to_string(),
                reason,
            }
        })
    }

    fn from_str_with_format(contents: &str, is_toml: bool) -> Result<Self, String> {
        if is_toml {
            toml::from_str(contents).map_err(|err| err.to_string())
        } else {
            serde_json::from_str(contents).map_err(|err| err.to_string())
        }
    }

    /// Validates the configuration and returns the parsed repository.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<RepositoryFullName, ConfigError> {
        let repository = RepositoryFullName::new(self.repository.as_str())?;
        if self.label_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyLabelPrefix);
        }
        let url = self.api_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(repository)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the base backoff delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Returns the cap for a single backoff delay.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Returns the cap for the summed backoff of one call.
    #[must_use]
    pub const fn max_total_backoff(&self) -> Duration {
        Duration::from_millis(self.max_total_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig};
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    fn json_config_uses_contract_keys() {
        let json = r#"{
            "enabled": true,
            "repository": "acme/platform",
            "labelPrefix": "kiro:",
            "apiUrl": "https://github.example.com/api/v3",
            "maxRetries": 5,
            "retryDelay_ms": 250,
            "rateLimitBuffer": 20
        }"#;
        let config = SyncConfig::from_str_with_format(json, false).expect("valid config");

        assert!(config.enabled);
        assert_eq!(config.label_prefix, "kiro:");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_ms, 250);
        assert_eq!(config.rate_limit_buffer, 20);
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[rstest]
    fn toml_config_is_parsed_by_extension() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(file, "enabled = true\nrepository = \"acme/platform\"\nmaxRetries = 1")
            .expect("write config");
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf-8 path");

        let config = SyncConfig::load(&path).expect("config loads");

        assert_eq!(config.repository, "acme/platform");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.label_prefix, "task:");
    }

    #[rstest]
    fn missing_config_file_is_a_read_error() {
        let result = SyncConfig::load(camino::Utf8Path::new("/nonexistent/tasksync.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[rstest]
    #[case("owner-only", "task:", "https://api.github.com", 1)]
    #[case("acme/platform", "  ", "https://api.github.com", 1)]
    #[case("acme/platform", "task:", "ftp://example.com", 1)]
    #[case("acme/platform", "task:", "https://api.github.com", 0)]
    fn validate_rejects_invalid_values(
        #[case] repository: &str,
        #[case] prefix: &str,
        #[case] api_url: &str,
        #[case] timeout_ms: u64,
    ) {
        let config = SyncConfig {
            repository: repository.to_owned(),
            label_prefix: prefix.to_owned(),
            api_url: api_url.to_owned(),
            request_timeout_ms: timeout_ms,
            ..SyncConfig::for_repository("acme/platform")
        };
        assert!(config.validate().is_err());
    }

    #[rstest]
    fn validate_returns_repository() {
        let repository = SyncConfig::for_repository("acme/platform")
            .validate()
            .expect("valid config");
        assert_eq!(repository.as_str(), "acme/platform");
    }
}
