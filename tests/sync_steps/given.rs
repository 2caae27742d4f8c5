//! Given steps for synchronisation BDD scenarios.

use super::world::{SyncWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use tasksync::sync::{
    adapters::memory::TrackerOperation, domain::IssueState, ports::TrackerError,
    services::CancellationFlag,
};

#[given(r#"a task file containing "{markdown}""#)]
fn task_file_containing(world: &mut SyncWorld, markdown: String) -> Result<(), eyre::Report> {
    world.set_document(&markdown)
}

#[given("a task file with a malformed line between two tasks")]
fn task_file_with_malformed_line(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    world.set_document("- [ ] 1. First task\n- [ ] 2 Missing period\n- [x] 3. Third task\n")
}

#[given(r#"an open issue labelled "{label}" titled "{title}""#)]
fn open_issue(world: &mut SyncWorld, label: String, title: String) -> Result<(), eyre::Report> {
    world
        .tracker
        .seed_issue(&title, "", IssueState::Open, [label].into_iter().collect())
        .wrap_err("seed existing issue")?;
    Ok(())
}

#[given("the task file has been synchronised once")]
fn synchronised_once(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let document = world.document()?.clone();
    run_async(world.orchestrator.run(&document, &CancellationFlag::new()))
        .wrap_err("initial synchronisation")?;
    Ok(())
}

#[given("the tracker rejects the credentials")]
fn tracker_rejects_credentials(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    world
        .tracker
        .fail_next(
            TrackerOperation::TestConnection,
            TrackerError::Auth("Bad credentials".to_owned()),
        )
        .wrap_err("script auth failure")?;
    Ok(())
}
