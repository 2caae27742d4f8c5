//! GitHub REST payloads and their mapping to domain types.

use serde::{Deserialize, Serialize};

use crate::sync::{
    domain::{Issue, IssueNumber, IssueState, LabelSet},
    ports::TrackerError,
};

/// Issue as returned by the GitHub issues API.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    /// Present when the entry is a pull request rather than an issue.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct GitHubLabel {
    pub name: String,
}

impl GitHubIssue {
    pub(super) const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub(super) fn into_domain(self) -> Result<Issue, TrackerError> {
        let number =
            IssueNumber::new(self.number).map_err(|err| TrackerError::Unknown(err.to_string()))?;
        let state = if self.state.eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        Ok(Issue {
            number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state,
            labels: self.labels.into_iter().map(|label| label.name).collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateIssueRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub labels: Vec<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct UpdateIssueRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReplaceLabelsRequest<'a> {
    pub labels: Vec<&'a str>,
}

impl<'a> ReplaceLabelsRequest<'a> {
    pub(super) fn new(labels: &'a LabelSet) -> Self {
        Self {
            labels: labels.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct GitHubRepository {
    pub full_name: String,
    #[serde(default)]
    pub permissions: Option<GitHubPermissions>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(super) struct GitHubPermissions {
    #[serde(default)]
    pub push: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct GitHubErrorBody {
    #[serde(default)]
    pub message: String,
}
