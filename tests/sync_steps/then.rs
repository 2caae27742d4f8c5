//! Then steps for synchronisation BDD scenarios.

use super::world::SyncWorld;
use rstest_bdd_macros::then;
use tasksync::sync::{
    domain::{IssueState, LabelSet},
    services::SyncRunError,
};

#[then(r#"the issue for task "{task_id}" is titled "{title}""#)]
fn issue_titled(world: &SyncWorld, task_id: String, title: String) -> Result<(), eyre::Report> {
    let issue = world.issue_for(&task_id)?;
    if issue.title != title {
        return Err(eyre::eyre!("expected title {title:?}, found {:?}", issue.title));
    }
    Ok(())
}

#[then(r#"the issue for task "{task_id}" is closed"#)]
fn issue_closed(world: &SyncWorld, task_id: String) -> Result<(), eyre::Report> {
    expect_state(world, &task_id, IssueState::Closed)
}

#[then(r#"the issue for task "{task_id}" is open"#)]
fn issue_open(world: &SyncWorld, task_id: String) -> Result<(), eyre::Report> {
    expect_state(world, &task_id, IssueState::Open)
}

fn expect_state(
    world: &SyncWorld,
    task_id: &str,
    expected: IssueState,
) -> Result<(), eyre::Report> {
    let issue = world.issue_for(task_id)?;
    if issue.state != expected {
        return Err(eyre::eyre!(
            "expected issue for task {task_id} to be {expected}, found {}",
            issue.state
        ));
    }
    Ok(())
}

#[then(r#"the issue for task "{task_id}" has labels "{labels}""#)]
fn issue_labels(world: &SyncWorld, task_id: String, labels: String) -> Result<(), eyre::Report> {
    let expected: LabelSet = labels.split(',').map(str::trim).collect();
    let issue = world.issue_for(&task_id)?;
    if issue.labels != expected {
        return Err(eyre::eyre!(
            "expected labels {:?}, found {:?}",
            expected.to_vec(),
            issue.labels.to_vec()
        ));
    }
    Ok(())
}

#[then("the run updated {updated:usize} issues and closed {closed:usize} issues")]
fn run_counts(world: &SyncWorld, updated: usize, closed: usize) -> Result<(), eyre::Report> {
    let report = world.report()?;
    if report.updated != updated || report.closed != closed {
        return Err(eyre::eyre!(
            "expected {updated} updated and {closed} closed, found {} and {}",
            report.updated,
            report.closed
        ));
    }
    Ok(())
}

#[then("the plan lists {tasks:usize} tasks and {skipped:usize} skipped lines")]
fn plan_counts(world: &SyncWorld, tasks: usize, skipped: usize) -> Result<(), eyre::Report> {
    let plan = world
        .last_plan
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing dry-run plan in scenario world"))?;
    if plan.total_tasks != tasks || plan.skipped_lines.len() != skipped {
        return Err(eyre::eyre!(
            "expected {tasks} tasks and {skipped} skipped lines, found {} and {}",
            plan.total_tasks,
            plan.skipped_lines.len()
        ));
    }
    Ok(())
}

#[then("the run performed no mutations")]
fn no_mutations(world: &SyncWorld) -> Result<(), eyre::Report> {
    let report = world.report()?;
    if report.mutation_count() != 0 {
        return Err(eyre::eyre!(
            "expected no mutations, found {}",
            report.mutation_count()
        ));
    }
    Ok(())
}

#[then("the run fails with an authentication error")]
fn run_fails_with_auth(world: &SyncWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_run
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing run result in scenario world"))?;
    if !matches!(result, Err(SyncRunError::Auth { .. })) {
        return Err(eyre::eyre!("expected an authentication failure, got {result:?}"));
    }
    Ok(())
}
