//! Shared builders for sync unit tests.

use crate::sync::{
    domain::{SourceContext, SourceLocation, SpecName, Task, TaskData, TaskKey, TaskStatus},
    services::SourceDocument,
};

pub(super) const SPEC_PATH: &str = ".kiro/specs/x/tasks.md";
pub(super) const PREFIX: &str = "task:";

pub(super) fn spec_name() -> SpecName {
    SpecName::new("x").expect("valid spec name")
}

pub(super) fn context() -> SourceContext {
    SourceContext::new(spec_name(), SPEC_PATH)
}

pub(super) fn document(markdown: &str) -> SourceDocument {
    SourceDocument::new(context(), markdown)
}

pub(super) fn task_with(
    key: &str,
    title: &str,
    status: TaskStatus,
    requirements: &[&str],
    description: &str,
) -> Task {
    Task::new(TaskData {
        key: TaskKey::new(key).expect("valid task key"),
        title: title.to_owned(),
        status,
        requirements: requirements.iter().map(|value| (*value).to_owned()).collect(),
        description: description.to_owned(),
        spec_name: spec_name(),
        source_location: SourceLocation::new(SPEC_PATH, 1),
        phase_heading: None,
    })
    .expect("valid task")
}

pub(super) fn task(key: &str, title: &str, status: TaskStatus) -> Task {
    task_with(key, title, status, &[], "")
}
