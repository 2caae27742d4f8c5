//! Unit tests for the sync module.
//!
//! Tests are organised by component: parsing, labelling, rendering, the run
//! state machine, per-task reconciliation, orchestration, and hooks.

mod orchestrator_tests;
mod parser_tests;
mod support;
