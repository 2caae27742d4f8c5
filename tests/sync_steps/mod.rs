//! Step definitions for checklist synchronisation scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
