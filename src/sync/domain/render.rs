//! Issue title and body rendering.

use super::{IssueContent, SYNC_TIMESTAMP_PREFIX, SyncDomainError, Task, derive_labels};
use minijinja::{Environment, context};
use mockable::Clock;
use serde::Serialize;

/// Human-readable expansions of requirement references.
const REQUIREMENT_DESCRIPTIONS: [(&str, &str); 19] = [
    ("1.1", "Workspace and tooling setup"),
    ("1.2", "Shared configuration management"),
    ("2.1", "Database schema and migrations"),
    ("2.2", "Data access layer"),
    ("3.1", "User authentication"),
    ("3.2", "Authorization and role management"),
    ("4.1", "Tenant isolation"),
    ("4.2", "Tenant provisioning"),
    ("5.1", "User management"),
    ("5.2", "User profiles and preferences"),
    ("6.1", "File storage and uploads"),
    ("7.1", "Workflow orchestration"),
    ("7.2", "Durable workflow execution"),
    ("8.1", "Frontend shell and micro-frontend composition"),
    ("8.2", "Backend-for-frontend aggregation"),
    ("9.1", "Public API surface"),
    ("10.1", "Automated testing"),
    ("11.1", "AI-assisted features"),
    ("12.1", "Module packaging and release"),
];

const UNKNOWN_REQUIREMENT: &str = "See the requirements document";

const IMPLEMENTATION_GUIDELINES: [&str; 4] = [
    "Follow the design document for this spec before writing code",
    "Cover new behaviour with unit and integration tests",
    "Keep changes scoped to this task and reference it in commits",
    "Tick the task checkbox in the spec file once the work is merged",
];

const BODY_TEMPLATE: &str = "\
## Task {{ task_id }}: {{ title }}
{% if description %}
### Description

{% for line in description %}- {{ line }}
{% endfor %}{% endif %}{% if requirements %}
### Requirements

{% for requirement in requirements %}- **{{ requirement.id }}**: {{ requirement.description }}
{% endfor %}{% endif %}
### Implementation Guidelines

{% for guideline in guidelines %}- {{ guideline }}
{% endfor %}
---
**Task ID:** {{ task_id }}
**Spec:** {{ spec }}
**Status:** {{ status }}
**Source:** `{{ source }}`
{{ timestamp_prefix }} {{ synced_at }}*
";

#[derive(Debug, Serialize)]
struct RequirementLine<'a> {
    id: &'a str,
    description: &'static str,
}

/// Returns the description for a requirement reference.
#[must_use]
pub fn describe_requirement(requirement: &str) -> &'static str {
    REQUIREMENT_DESCRIPTIONS
        .iter()
        .find(|(id, _)| *id == requirement)
        .map_or(UNKNOWN_REQUIREMENT, |(_, description)| description)
}

/// Renders the issue title: `{icon} [{spec}] {id}: {title}`.
#[must_use]
pub fn issue_title(task: &Task) -> String {
    format!(
        "{} [{}] {}: {}",
        task.status().icon(),
        task.spec_name(),
        task.key(),
        task.title()
    )
}

/// Renders the issue body with the provenance footer.
///
/// # Errors
///
/// Returns [`SyncDomainError::TemplateRender`] when template rendering fails.
pub fn issue_body(task: &Task, clock: &impl Clock) -> Result<String, SyncDomainError> {
    let description: Vec<&str> = task
        .description()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let requirements: Vec<RequirementLine<'_>> = task
        .requirements()
        .iter()
        .map(|requirement| RequirementLine {
            id: requirement,
            description: describe_requirement(requirement),
        })
        .collect();

    let environment = Environment::new();
    environment
        .render_str(
            BODY_TEMPLATE,
            context! {
                task_id => task.key().as_str(),
                title => task.title(),
                description => description,
                requirements => requirements,
                guidelines => IMPLEMENTATION_GUIDELINES,
                spec => task.spec_name().as_str(),
                status => task.status().as_str(),
                source => task.source_location().to_string(),
                timestamp_prefix => SYNC_TIMESTAMP_PREFIX,
                synced_at => clock.utc().to_rfc3339(),
            },
        )
        .map_err(|error| SyncDomainError::TemplateRender(error.to_string()))
}

/// Renders title, body, and labels for a task.
///
/// # Errors
///
/// Returns [`SyncDomainError::TemplateRender`] when body rendering fails.
pub fn render_issue(
    task: &Task,
    label_prefix: &str,
    clock: &impl Clock,
) -> Result<IssueContent, SyncDomainError> {
    Ok(IssueContent {
        title: issue_title(task),
        body: issue_body(task, clock)?,
        labels: derive_labels(task, label_prefix),
    })
}
