//! Retry and timeout decorator for issue trackers.
//!
//! Every call runs under its own timeout. Transient failures of idempotent
//! calls are retried with exponential backoff; the sum of backoff delays for
//! one call is capped, after which the last error is returned to the caller.
//!
//! Issue creation is attempted once. A timed-out create may still have
//! landed, so retrying it blindly could mint a second issue with the same
//! identity label; reconciliation retries it after a fresh lookup instead.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::sync::{
    config::SyncConfig,
    domain::{Issue, IssueNumber, LabelSet},
    ports::{ConnectionCheck, IssueTracker, TrackerError, TrackerResult},
};

/// Bounds applied to every tracker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Upper bound for one delay.
    pub max_delay: Duration,
    /// Upper bound for the summed delays of one call.
    pub max_total_backoff: Duration,
    /// Timeout applied to each attempt.
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Builds the policy described by `config`.
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay(),
            max_delay: config.max_backoff(),
            max_total_backoff: config.max_total_backoff(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Returns the delay before retry number `attempt` (zero-based).
    ///
    /// A server hint raises the delay but never past `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt));
        hint.map_or(exponential, |server_delay| exponential.max(server_delay))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// Issue tracker wrapper adding timeouts and bounded retries.
#[derive(Debug, Clone)]
pub struct RetryingTracker<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryingTracker<T>
where
    T: IssueTracker,
{
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Runs one attempt under the request timeout.
    async fn attempt<R, Fut>(&self, operation: &'static str, pending: Fut) -> TrackerResult<R>
    where
        Fut: Future<Output = TrackerResult<R>> + Send,
    {
        tokio::time::timeout(self.policy.request_timeout, pending)
            .await
            .unwrap_or_else(|_| {
                Err(TrackerError::Network(format!(
                    "{operation} timed out after {}ms",
                    self.policy.request_timeout.as_millis()
                )))
            })
    }

    async fn call<R, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_call: F,
    ) -> TrackerResult<R>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = TrackerResult<R>> + Send,
        R: Send,
    {
        let mut attempt: u32 = 0;
        let mut total_backoff = Duration::ZERO;
        loop {
            let outcome = self.attempt(operation, attempt_call()).await;

            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation,
                            attempts = attempt + 1,
                            "tracker call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_transient() || attempt >= self.policy.max_retries {
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt, error.retry_after());
            let next_total = total_backoff.saturating_add(delay);
            if next_total > self.policy.max_total_backoff {
                warn!(
                    operation,
                    total_backoff_ms = total_backoff.as_millis(),
                    error = %error,
                    "backoff budget exhausted, giving up"
                );
                return Err(error);
            }

            warn!(
                operation,
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis(),
                kind = %error.kind(),
                error = %error,
                "transient tracker failure, retrying"
            );
            tokio::time::sleep(delay).await;
            total_backoff = next_total;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<T> IssueTracker for RetryingTracker<T>
where
    T: IssueTracker,
{
    async fn find_issues_by_label(&self, label: &str) -> TrackerResult<Vec<Issue>> {
        self.call("find_issues_by_label", || {
            self.inner.find_issues_by_label(label)
        })
        .await
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &LabelSet,
    ) -> TrackerResult<Issue> {
        self.attempt("create_issue", self.inner.create_issue(title, body, labels))
            .await
    }

    async fn update_issue(
        &self,
        number: IssueNumber,
        title: &str,
        body: &str,
    ) -> TrackerResult<()> {
        self.call("update_issue", || self.inner.update_issue(number, title, body))
            .await
    }

    async fn update_issue_labels(
        &self,
        number: IssueNumber,
        labels: &LabelSet,
    ) -> TrackerResult<()> {
        self.call("update_issue_labels", || {
            self.inner.update_issue_labels(number, labels)
        })
        .await
    }

    async fn close_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        self.call("close_issue", || self.inner.close_issue(number))
            .await
    }

    async fn reopen_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        self.call("reopen_issue", || self.inner.reopen_issue(number))
            .await
    }

    async fn test_connection(&self) -> TrackerResult<ConnectionCheck> {
        self.call("test_connection", || self.inner.test_connection())
            .await
    }
}
