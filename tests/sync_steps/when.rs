//! When steps for synchronisation BDD scenarios.

use super::world::{SyncWorld, run_async};
use rstest_bdd_macros::when;
use tasksync::sync::services::CancellationFlag;

#[when("the task file is synchronised")]
fn synchronise(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let document = world.document()?.clone();
    world.last_run = Some(run_async(
        world.orchestrator.run(&document, &CancellationFlag::new()),
    ));
    Ok(())
}

#[when("the task file is analysed in dry-run mode")]
fn analyse(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let plan = world.orchestrator.dry_run(world.document()?)?;
    world.last_plan = Some(plan);
    Ok(())
}
