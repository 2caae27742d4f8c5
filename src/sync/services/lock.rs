//! Per-repository run serialisation.

use crate::sync::domain::RepositoryFullName;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

type RunSlot = Arc<tokio::sync::Mutex<()>>;

/// Registry of one async mutex per repository.
///
/// Cloning shares the registry, so every orchestrator built from the same
/// `RepositoryLocks` serialises live runs against the same repository.
#[derive(Debug, Clone, Default)]
pub struct RepositoryLocks {
    slots: Arc<Mutex<HashMap<RepositoryFullName, RunSlot>>>,
}

impl RepositoryLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, repository: &RepositoryFullName) -> RunSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(repository.clone()).or_default())
    }

    /// Waits until no other run holds `repository`, then takes it.
    pub async fn acquire(&self, repository: &RepositoryFullName) -> RunGuard {
        let guard = self.slot(repository).lock_owned().await;
        RunGuard {
            repository: repository.clone(),
            _guard: guard,
        }
    }

    /// Takes `repository` only if no run currently holds it.
    #[must_use]
    pub fn try_acquire(&self, repository: &RepositoryFullName) -> Option<RunGuard> {
        let guard = self.slot(repository).try_lock_owned().ok()?;
        Some(RunGuard {
            repository: repository.clone(),
            _guard: guard,
        })
    }

    /// Returns `true` while a run holds `repository`.
    #[must_use]
    pub fn is_locked(&self, repository: &RepositoryFullName) -> bool {
        self.slot(repository).try_lock().is_err()
    }
}

/// Exclusive hold on a repository for the duration of one live run.
///
/// Dropping the guard releases the repository.
#[derive(Debug)]
pub struct RunGuard {
    repository: RepositoryFullName,
    _guard: OwnedMutexGuard<()>,
}

impl RunGuard {
    /// Returns the held repository.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryFullName {
        &self.repository
    }
}
