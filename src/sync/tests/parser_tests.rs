//! Unit tests for the markdown task parser.

use super::support::context;
use crate::sync::domain::{TaskStatus, parse_tasks};
use rstest::rstest;

const PHASED_DOCUMENT: &str = "\
# Implementation Plan

## Phase 1: Foundation

- [x] 1. Set up workspace
  - Create the repository skeleton
  * Configure CI
  - _Requirements: 1.1, (1.2), NFR-3_

- [-] 2. Build the tenant API
  - Expose tenant endpoints

## Phase 2: Delivery

- [ ] 3. Ship it
";

#[rstest]
fn malformed_line_is_skipped_between_valid_tasks() {
    let markdown = "- [ ] 1. First task\n- [x] 2 Missing period\n- [-] 3. Third task\n";

    let parsed = parse_tasks(markdown, &context());

    let keys: Vec<&str> = parsed.tasks.iter().map(|task| task.key().as_str()).collect();
    assert_eq!(keys, vec!["1", "3"]);
    assert_eq!(parsed.skipped.len(), 1);
    let skipped = parsed.skipped.first().expect("one skipped line");
    assert_eq!(skipped.line, 2);
    assert_eq!(skipped.content, "- [x] 2 Missing period");
}

#[rstest]
fn crlf_and_lf_documents_parse_identically() {
    let crlf = PHASED_DOCUMENT.replace('\n', "\r\n");

    let from_lf = parse_tasks(PHASED_DOCUMENT, &context());
    let from_crlf = parse_tasks(&crlf, &context());

    assert_eq!(from_lf, from_crlf);
    assert_eq!(from_lf.tasks.len(), 3);
}

#[rstest]
#[case("- [ ] 1. Task", TaskStatus::NotStarted)]
#[case("- [x] 1. Task", TaskStatus::Completed)]
#[case("- [X] 1. Task", TaskStatus::Completed)]
#[case("- [-] 1. Task", TaskStatus::InProgress)]
#[case("   - [x] 1. Indented task", TaskStatus::Completed)]
fn checkbox_marker_maps_to_status(#[case] line: &str, #[case] expected: TaskStatus) {
    let parsed = parse_tasks(line, &context());

    let task = parsed.tasks.first().expect("one task");
    assert_eq!(task.status(), expected);
}

#[rstest]
fn details_are_collected_until_blank_line() {
    let parsed = parse_tasks(PHASED_DOCUMENT, &context());
    let first = parsed.tasks.first().expect("first task");

    assert_eq!(first.title(), "Set up workspace");
    assert_eq!(
        first.description(),
        "Create the repository skeleton\nConfigure CI"
    );
    assert_eq!(first.requirements(), ["1.1", "1.2", "NFR-3"]);
    assert_eq!(first.phase_heading(), Some("Phase 1: Foundation"));
    assert_eq!(first.source_location().line(), 5);
}

#[rstest]
fn phase_heading_tracks_latest_section() {
    let parsed = parse_tasks(PHASED_DOCUMENT, &context());
    let last = parsed.tasks.last().expect("last task");

    assert_eq!(last.key().as_str(), "3");
    assert_eq!(last.phase_heading(), Some("Phase 2: Delivery"));
    assert!(last.requirements().is_empty());
}

#[rstest]
fn details_stop_at_next_checkbox() {
    let markdown = "- [ ] 1. First\n- [ ] 2. Second\n  - belongs to second\n";

    let parsed = parse_tasks(markdown, &context());

    let first = parsed.tasks.first().expect("first task");
    let second = parsed.tasks.get(1).expect("second task");
    assert_eq!(first.description(), "");
    assert_eq!(second.description(), "belongs to second");
}

#[rstest]
fn blank_line_ends_the_detail_window() {
    let markdown = "- [ ] 1. First\n\n  - _Requirements: 1.1_\n";

    let parsed = parse_tasks(markdown, &context());

    let first = parsed.tasks.first().expect("first task");
    assert!(first.requirements().is_empty());
}

#[rstest]
fn duplicate_ids_are_kept_in_document_order() {
    let markdown = "- [ ] 1. Original\n- [x] 1. Replacement\n";

    let parsed = parse_tasks(markdown, &context());

    let titles: Vec<&str> = parsed.tasks.iter().map(|task| task.title()).collect();
    assert_eq!(titles, vec!["Original", "Replacement"]);
}

#[rstest]
fn subtask_ids_keep_their_dots() {
    let parsed = parse_tasks("- [ ] 10.2. Nested work", &context());

    let task = parsed.tasks.first().expect("one task");
    assert_eq!(task.key().as_str(), "10.2");
    assert_eq!(task.title(), "Nested work");
}

#[rstest]
fn plain_text_and_headings_are_ignored() {
    let markdown = "# Title\nSome prose.\n- not a task\n";

    let parsed = parse_tasks(markdown, &context());

    assert!(parsed.tasks.is_empty());
    assert!(parsed.skipped.is_empty());
}
