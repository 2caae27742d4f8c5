//! GitHub issues API client implementing [`IssueTracker`].

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::models::{
    CreateIssueRequest, GitHubErrorBody, GitHubIssue, GitHubRepository, ReplaceLabelsRequest,
    UpdateIssueRequest,
};
use crate::sync::{
    config::{ConfigError, SyncConfig},
    domain::{Issue, IssueNumber, LabelSet, RepositoryFullName},
    ports::{ConnectionCheck, IssueTracker, TrackerError, TrackerResult},
};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("tasksync/", env!("CARGO_PKG_VERSION"));
const RATE_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Rate-limit figures reported by the last response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RateLimitWindow {
    remaining: Option<u32>,
    reset_epoch_secs: Option<i64>,
}

impl RateLimitWindow {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_value(headers, RATE_REMAINING_HEADER),
            reset_epoch_secs: header_value(headers, RATE_RESET_HEADER),
        }
    }

    /// Returns the time left before the window resets, or `None` once it
    /// has reset.
    fn wait_until_reset(&self, now_epoch_secs: i64) -> Option<Duration> {
        let reset = self.reset_epoch_secs?;
        let seconds = u64::try_from(reset.saturating_sub(now_epoch_secs)).ok()?;
        (seconds > 0).then(|| Duration::from_secs(seconds))
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Issue tracker backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubIssueTracker {
    http: reqwest::Client,
    api_url: String,
    repository: RepositoryFullName,
    token: String,
    rate_limit_buffer: u32,
    window: Arc<Mutex<RateLimitWindow>>,
}

impl GitHubIssueTracker {
    /// Creates a client for the repository named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid, the token
    /// is blank, or the HTTP client cannot be built.
    pub fn new(config: &SyncConfig, token: impl Into<String>) -> Result<Self, ConfigError> {
        let repository = config.validate()?;
        let token_value = token.into();
        if token_value.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim().trim_end_matches('/').to_owned(),
            repository,
            token: token_value,
            rate_limit_buffer: config.rate_limit_buffer,
            window: Arc::new(Mutex::new(RateLimitWindow::default())),
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!("{}/repos/{}{suffix}", self.api_url, self.repository)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    /// Refuses to send while the remaining budget is inside the buffer.
    ///
    /// A window whose reset time has passed, or that never reported one, is
    /// cleared so the next response refreshes it.
    fn check_rate_budget(&self, now_epoch_secs: i64) -> TrackerResult<()> {
        let mut window = self
            .window
            .lock()
            .map_err(|err| TrackerError::Unknown(err.to_string()))?;
        let Some(remaining) = window.remaining else {
            return Ok(());
        };
        if remaining > self.rate_limit_buffer {
            return Ok(());
        }
        let Some(wait) = window.wait_until_reset(now_epoch_secs) else {
            *window = RateLimitWindow::default();
            return Ok(());
        };
        Err(TrackerError::rate_limited(
            format!(
                "{remaining} requests left, at or below buffer of {}",
                self.rate_limit_buffer
            ),
            Some(wait),
        ))
    }

    fn record_window(&self, headers: &HeaderMap) {
        let observed = RateLimitWindow::from_headers(headers);
        if observed.remaining.is_none() {
            return;
        }
        if let Ok(mut window) = self.window.lock() {
            *window = observed;
        }
    }

    async fn send(&self, builder: RequestBuilder) -> TrackerResult<Response> {
        self.check_rate_budget(Utc::now().timestamp())?;
        let response = builder
            .send()
            .await
            .map_err(|err| TrackerError::Network(err.to_string()))?;
        self.record_window(response.headers());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let message = response
            .json::<GitHubErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_default();
        let error = classify_failure(status, &headers, &message, Utc::now().timestamp());
        warn!(status = status.as_u16(), kind = %error.kind(), message, "GitHub request failed");
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> TrackerResult<T> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|err| TrackerError::Unknown(format!("malformed GitHub response: {err}")))
    }

    async fn patch_issue(
        &self,
        number: IssueNumber,
        payload: &UpdateIssueRequest<'_>,
    ) -> TrackerResult<()> {
        let url = self.repo_url(&format!("/issues/{}", number.value()));
        self.send(self.request(Method::PATCH, &url).json(payload))
            .await
            .map(|_| ())
    }
}

/// Maps an unsuccessful GitHub response to a [`TrackerError`].
fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    message: &str,
    now_epoch_secs: i64,
) -> TrackerError {
    let detail = if message.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {message}")
    };
    let window = RateLimitWindow::from_headers(headers);
    let retry_after = header_value::<u64>(headers, RETRY_AFTER_HEADER)
        .map(Duration::from_secs)
        .or_else(|| window.wait_until_reset(now_epoch_secs));
    let rate_exhausted = window.remaining == Some(0)
        || headers.contains_key(RETRY_AFTER_HEADER)
        || message.to_ascii_lowercase().contains("rate limit");

    match status {
        StatusCode::TOO_MANY_REQUESTS => TrackerError::rate_limited(detail, retry_after),
        StatusCode::FORBIDDEN if rate_exhausted => TrackerError::rate_limited(detail, retry_after),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TrackerError::Auth(detail),
        StatusCode::NOT_FOUND | StatusCode::GONE => TrackerError::NotFound(detail),
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
            TrackerError::Validation(detail)
        }
        StatusCode::REQUEST_TIMEOUT => TrackerError::Network(detail),
        _ if status.is_server_error() => TrackerError::Network(detail),
        _ => TrackerError::Unknown(detail),
    }
}

#[async_trait]
impl IssueTracker for GitHubIssueTracker {
    async fn find_issues_by_label(&self, label: &str) -> TrackerResult<Vec<Issue>> {
        let url = self.repo_url(&format!(
            "/issues?labels={}&state=all&sort=created&direction=desc&per_page=10",
            urlencoding::encode(label)
        ));
        let issues: Vec<GitHubIssue> = self.send_json(self.request(Method::GET, &url)).await?;
        issues
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .map(GitHubIssue::into_domain)
            .collect()
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &LabelSet,
    ) -> TrackerResult<Issue> {
        let url = self.repo_url("/issues");
        let payload = CreateIssueRequest {
            title,
            body,
            labels: labels.iter().collect(),
        };
        let created: GitHubIssue = self
            .send_json(self.request(Method::POST, &url).json(&payload))
            .await?;
        debug!(issue = created.number, "created GitHub issue");
        created.into_domain()
    }

    async fn update_issue(
        &self,
        number: IssueNumber,
        title: &str,
        body: &str,
    ) -> TrackerResult<()> {
        let payload = UpdateIssueRequest {
            title: Some(title),
            body: Some(body),
            ..UpdateIssueRequest::default()
        };
        self.patch_issue(number, &payload).await
    }

    async fn update_issue_labels(
        &self,
        number: IssueNumber,
        labels: &LabelSet,
    ) -> TrackerResult<()> {
        let url = self.repo_url(&format!("/issues/{}/labels", number.value()));
        let payload = ReplaceLabelsRequest::new(labels);
        self.send(self.request(Method::PUT, &url).json(&payload))
            .await
            .map(|_| ())
    }

    async fn close_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        let payload = UpdateIssueRequest {
            state: Some("closed"),
            state_reason: Some("completed"),
            ..UpdateIssueRequest::default()
        };
        self.patch_issue(number, &payload).await
    }

    async fn reopen_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        let payload = UpdateIssueRequest {
            state: Some("open"),
            state_reason: Some("reopened"),
            ..UpdateIssueRequest::default()
        };
        self.patch_issue(number, &payload).await
    }

    async fn test_connection(&self) -> TrackerResult<ConnectionCheck> {
        let url = self.repo_url("");
        match self
            .send_json::<GitHubRepository>(self.request(Method::GET, &url))
            .await
        {
            Ok(repository) => {
                let can_push = repository
                    .permissions
                    .is_none_or(|permissions| permissions.push);
                if can_push {
                    Ok(ConnectionCheck::ok(format!(
                        "connected to {}",
                        repository.full_name
                    )))
                } else {
                    Ok(ConnectionCheck::failed(format!(
                        "token lacks write access to {}",
                        repository.full_name
                    )))
                }
            }
            Err(TrackerError::NotFound(_)) => Ok(ConnectionCheck::failed(format!(
                "repository {} not found or not visible to the token",
                self.repository
            ))),
            Err(error) => Err(error),
        }
    }
}
