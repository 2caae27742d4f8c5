//! Deterministic label taxonomy derived from tasks.
//!
//! Labels are always recomputed from a [`Task`] and written back with
//! full-replace semantics. Both dry-run analysis and live reconciliation
//! call [`derive_labels`], so the plan shown to a user and the mutations a
//! live run performs are computed from the same function.

use super::{Task, TaskKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Prefix of the spec label.
pub const SPEC_LABEL_PREFIX: &str = "spec:";
/// Prefix of the status label.
pub const STATUS_LABEL_PREFIX: &str = "status:";
/// Prefix of the phase label.
pub const PHASE_LABEL_PREFIX: &str = "phase:";
/// Prefix of requirement labels.
pub const REQUIREMENT_LABEL_PREFIX: &str = "requirement:";
/// Prefix of component labels.
pub const COMPONENT_LABEL_PREFIX: &str = "component:";

/// Phase buckets keyed by the inclusive upper bound of the leading id
/// segment. Tasks beyond the last bound fall into [`FINAL_PHASE`].
const PHASE_BUCKETS: [(u64, &str); 10] = [
    (7, "1-2"),
    (13, "3"),
    (19, "4"),
    (25, "5"),
    (31, "6"),
    (37, "7"),
    (43, "8"),
    (49, "9"),
    (55, "10"),
    (61, "11"),
];

const FINAL_PHASE: &str = "12";

/// Component keywords matched case-insensitively against task titles, in
/// evaluation order. Each entry yields at most one label.
const COMPONENT_KEYWORDS: [(&str, &[&str]); 13] = [
    ("temporal", &["temporal"]),
    ("database", &["database", "migration"]),
    ("auth", &["auth"]),
    ("tenant", &["tenant"]),
    ("user", &["user"]),
    ("file", &["file"]),
    ("workflow", &["workflow"]),
    ("frontend", &["frontend", "micro-frontend"]),
    ("bff", &["bff"]),
    ("api", &["api"]),
    ("testing", &["test"]),
    ("ai", &["ai"]),
    ("module", &["module"]),
];

/// Ordered, de-duplicated set of issue labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Adds a label, ignoring blanks and duplicates.
    pub fn insert(&mut self, label: impl Into<String>) {
        let raw = label.into();
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            self.0.insert(trimmed.to_owned());
        }
    }

    /// Returns `true` when the set contains `label`.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Returns the number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates labels in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Iterates the suffixes of labels that start with `prefix`.
    pub fn values_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.iter().filter_map(move |label| label.strip_prefix(prefix))
    }

    /// Returns the labels as owned strings in sorted order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut labels = Self::new();
        for label in iter {
            labels.insert(label);
        }
        labels
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Returns the identity label linking a task to its issue.
#[must_use]
pub fn identity_label(prefix: &str, key: &TaskKey) -> String {
    format!("{prefix}{key}")
}

/// Returns the phase bucket name for a task key.
#[must_use]
pub fn phase_for(key: &TaskKey) -> &'static str {
    let leading = key.leading_segment();
    PHASE_BUCKETS
        .iter()
        .find(|(upper_bound, _)| leading <= *upper_bound)
        .map_or(FINAL_PHASE, |(_, phase)| phase)
}

/// Returns the component names whose keywords occur in `title`.
#[must_use]
pub fn components_for(title: &str) -> Vec<&'static str> {
    let lowered = title.to_lowercase();
    COMPONENT_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|(component, _)| *component)
        .collect()
}

/// Returns `true` for requirement references of the form `<major>.<minor>`.
#[must_use]
pub fn is_labelled_requirement(requirement: &str) -> bool {
    let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    requirement
        .split_once('.')
        .is_some_and(|(major, minor)| is_digits(major) && is_digits(minor))
}

/// Derives the complete label set for a task.
///
/// The result always holds exactly one identity, spec, status, and phase
/// label, plus any requirement and component labels.
#[must_use]
pub fn derive_labels(task: &Task, prefix: &str) -> LabelSet {
    let mut labels = LabelSet::new();
    labels.insert(identity_label(prefix, task.key()));
    labels.insert(format!("{SPEC_LABEL_PREFIX}{}", task.spec_name()));
    labels.insert(format!("{STATUS_LABEL_PREFIX}{}", task.status()));
    labels.insert(format!("{PHASE_LABEL_PREFIX}{}", phase_for(task.key())));

    for requirement in task
        .requirements()
        .iter()
        .filter(|requirement| is_labelled_requirement(requirement))
    {
        labels.insert(format!("{REQUIREMENT_LABEL_PREFIX}{requirement}"));
    }

    for component in components_for(task.title()) {
        labels.insert(format!("{COMPONENT_LABEL_PREFIX}{component}"));
    }
    labels
}
