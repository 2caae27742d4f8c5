//! Tasksync: keeps markdown task checklists and tracker issues aligned.
//!
//! Each task line in a checklist document is mirrored by exactly one issue,
//! found through a stable identity label. Runs are repeatable: a document
//! that has not changed produces no tracker mutations.
//!
//! # Architecture
//!
//! Tasksync follows hexagonal architecture principles:
//!
//! - **Domain**: Parsing, labelling, and rendering with no infrastructure
//! - **Ports**: Trait interfaces for the tracker, task files, and prompts
//! - **Adapters**: GitHub, filesystem, terminal, and in-memory
//!   implementations
//!
//! # Modules
//!
//! - [`sync`]: Task parsing, reconciliation, and run orchestration

pub mod sync;
