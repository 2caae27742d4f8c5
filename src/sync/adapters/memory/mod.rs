//! In-memory adapters for tests and local experimentation.

mod source;
mod tracker;

pub use source::InMemoryTaskSource;
pub use tracker::{InMemoryIssueTracker, TrackerOperation};
