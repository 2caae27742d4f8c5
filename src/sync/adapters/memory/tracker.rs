//! In-memory issue tracker for sync tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::sync::{
    domain::{Issue, IssueNumber, IssueState, LabelSet},
    ports::{ConnectionCheck, IssueTracker, TrackerError, TrackerResult},
};

/// Tracker operation names used for call logs and scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerOperation {
    /// `find_issues_by_label`.
    Find,
    /// `create_issue`.
    Create,
    /// `update_issue`.
    Update,
    /// `update_issue_labels`.
    UpdateLabels,
    /// `close_issue`.
    Close,
    /// `reopen_issue`.
    Reopen,
    /// `test_connection`.
    TestConnection,
}

impl TrackerOperation {
    /// Returns `true` for operations that change remote state.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::UpdateLabels | Self::Close | Self::Reopen
        )
    }
}

/// Thread-safe in-memory issue tracker.
///
/// Every call is logged, and failures can be queued per operation to
/// exercise retry and error-isolation paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIssueTracker {
    state: Arc<RwLock<InMemoryTrackerState>>,
}

#[derive(Debug, Default)]
struct InMemoryTrackerState {
    issues: BTreeMap<IssueNumber, Issue>,
    next_number: u64,
    calls: Vec<TrackerOperation>,
    scripted_failures: HashMap<TrackerOperation, VecDeque<TrackerError>>,
    fail_on_label: HashMap<String, TrackerError>,
    connection: Option<TrackerResult<ConnectionCheck>>,
}

impl InMemoryIssueTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an existing issue and returns its number.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn seed_issue(
        &self,
        title: &str,
        body: &str,
        state: IssueState,
        labels: LabelSet,
    ) -> TrackerResult<IssueNumber> {
        let mut guard = self.write()?;
        let number = allocate_number(&mut guard)?;
        guard.issues.insert(
            number,
            Issue {
                number,
                title: title.to_owned(),
                body: body.to_owned(),
                state,
                labels,
            },
        );
        Ok(number)
    }

    /// Queues an error returned by the next call to `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn fail_next(&self, operation: TrackerOperation, error: TrackerError) -> TrackerResult<()> {
        self.write()?
            .scripted_failures
            .entry(operation)
            .or_default()
            .push_back(error);
        Ok(())
    }

    /// Makes every lookup of `label` fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn fail_lookups_of(&self, label: &str, error: TrackerError) -> TrackerResult<()> {
        self.write()?.fail_on_label.insert(label.to_owned(), error);
        Ok(())
    }

    /// Overrides the connection check result.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn set_connection(&self, result: TrackerResult<ConnectionCheck>) -> TrackerResult<()> {
        self.write()?.connection = Some(result);
        Ok(())
    }

    /// Returns every issue ordered by number.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn issues(&self) -> TrackerResult<Vec<Issue>> {
        Ok(self.read()?.issues.values().cloned().collect())
    }

    /// Returns the call log in call order.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn calls(&self) -> TrackerResult<Vec<TrackerOperation>> {
        Ok(self.read()?.calls.clone())
    }

    /// Returns the number of state-changing calls made so far.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Unknown`] if the state lock is poisoned.
    pub fn mutation_count(&self) -> TrackerResult<usize> {
        Ok(self
            .read()?
            .calls
            .iter()
            .filter(|operation| operation.is_mutation())
            .count())
    }

    fn read(&self) -> TrackerResult<std::sync::RwLockReadGuard<'_, InMemoryTrackerState>> {
        self.state
            .read()
            .map_err(|err| TrackerError::Unknown(err.to_string()))
    }

    fn write(&self) -> TrackerResult<std::sync::RwLockWriteGuard<'_, InMemoryTrackerState>> {
        self.state
            .write()
            .map_err(|err| TrackerError::Unknown(err.to_string()))
    }

    /// Logs the call and pops a scripted failure, if any.
    fn begin(&self, operation: TrackerOperation) -> TrackerResult<()> {
        let mut guard = self.write()?;
        guard.calls.push(operation);
        match guard
            .scripted_failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn modify_issue(
        &self,
        number: IssueNumber,
        change: impl FnOnce(&mut Issue),
    ) -> TrackerResult<()> {
        let mut guard = self.write()?;
        let issue = guard
            .issues
            .get_mut(&number)
            .ok_or_else(|| TrackerError::NotFound(format!("issue {number}")))?;
        change(issue);
        Ok(())
    }
}

fn allocate_number(state: &mut InMemoryTrackerState) -> TrackerResult<IssueNumber> {
    state.next_number += 1;
    IssueNumber::new(state.next_number).map_err(|err| TrackerError::Unknown(err.to_string()))
}

#[async_trait]
impl IssueTracker for InMemoryIssueTracker {
    async fn find_issues_by_label(&self, label: &str) -> TrackerResult<Vec<Issue>> {
        self.begin(TrackerOperation::Find)?;
        let guard = self.read()?;
        if let Some(error) = guard.fail_on_label.get(label) {
            return Err(error.clone());
        }
        Ok(guard
            .issues
            .values()
            .rev()
            .filter(|issue| issue.labels.contains(label))
            .cloned()
            .collect())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &LabelSet,
    ) -> TrackerResult<Issue> {
        self.begin(TrackerOperation::Create)?;
        let mut guard = self.write()?;
        let number = allocate_number(&mut guard)?;
        let issue = Issue {
            number,
            title: title.to_owned(),
            body: body.to_owned(),
            state: IssueState::Open,
            labels: labels.clone(),
        };
        guard.issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        number: IssueNumber,
        title: &str,
        body: &str,
    ) -> TrackerResult<()> {
        self.begin(TrackerOperation::Update)?;
        self.modify_issue(number, |issue| {
            title.clone_into(&mut issue.title);
            body.clone_into(&mut issue.body);
        })
    }

    async fn update_issue_labels(
        &self,
        number: IssueNumber,
        labels: &LabelSet,
    ) -> TrackerResult<()> {
        self.begin(TrackerOperation::UpdateLabels)?;
        self.modify_issue(number, |issue| issue.labels = labels.clone())
    }

    async fn close_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        self.begin(TrackerOperation::Close)?;
        self.modify_issue(number, |issue| issue.state = IssueState::Closed)
    }

    async fn reopen_issue(&self, number: IssueNumber) -> TrackerResult<()> {
        self.begin(TrackerOperation::Reopen)?;
        self.modify_issue(number, |issue| issue.state = IssueState::Open)
    }

    async fn test_connection(&self) -> TrackerResult<ConnectionCheck> {
        self.begin(TrackerOperation::TestConnection)?;
        self.read()?
            .connection
            .clone()
            .unwrap_or_else(|| Ok(ConnectionCheck::ok("in-memory tracker ready")))
    }
}
