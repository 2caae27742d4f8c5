//! GitHub REST adapter for the issue tracker port.

mod client;
mod models;

pub use client::GitHubIssueTracker;
