//! Task-to-issue synchronisation for tasksync.
//!
//! This module keeps markdown task checklists and tracker issues aligned:
//! parsing task definitions, deriving the label taxonomy, and reconciling
//! each task with the issue that carries its identity label. Live runs are
//! serialised per repository and can be triggered from file-change hooks
//! after a dry-run preview. The module follows hexagonal architecture:
//!
//! - Domain types, the task parser, and label derivation in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Reconciliation, orchestration, and hook services in [`services`]
//! - Explicit run configuration in [`config`]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
