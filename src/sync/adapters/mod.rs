//! Adapter implementations for sync ports.

pub mod console;
pub mod fs;
pub mod github;
pub mod memory;
pub mod retry;
