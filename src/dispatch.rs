//! Workflow dispatch and run-id resolution.
//!
//! One dispatch call per repository, then a best-effort second pass that
//! resolves the run id each dispatch produced. A single repository failing
//! never stops the batch.

use crate::clock::Clock;
use crate::config::ScanTarget;
use crate::github::WorkflowApi;
use crate::models::{DispatchStatus, RunRecord};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// How many recent runs to inspect when resolving a run id.
const RUN_LOOKUP_WINDOW: usize = 10;

/// Grace delay before the lookup, so GitHub has registered the new runs.
const RUN_REGISTRATION_DELAY: Duration = Duration::from_secs(5);

/// Dispatches one workflow and returns the resulting record.
///
/// In dry-run mode no remote call is made; the record still appears in all
/// counts and outputs with the same shape as a real trigger.
pub async fn trigger_workflow<A: WorkflowApi>(
    api: &A,
    repo: &str,
    workflow_file: &str,
    branch: &str,
    dry_run: bool,
) -> RunRecord {
    if dry_run {
        println!("  [DRY RUN] Would trigger {} on {}@{}", workflow_file, repo, branch);
        return RunRecord::new(repo, workflow_file, branch, DispatchStatus::DryRun);
    }

    match api.create_dispatch(repo, workflow_file, branch).await {
        Ok(true) => {
            println!("  Triggered {} on {}@{}", workflow_file, repo, branch);
            RunRecord::new(repo, workflow_file, branch, DispatchStatus::Triggered)
        }
        Ok(false) => {
            println!("  Failed to trigger {} on {}", workflow_file, repo);
            let mut record = RunRecord::new(repo, workflow_file, branch, DispatchStatus::Failed);
            record.error = Some("create_dispatch returned false".to_string());
            record
        }
        Err(e) => {
            println!("  Error triggering {}: {}", repo, e);
            let mut record = RunRecord::new(repo, workflow_file, branch, DispatchStatus::Error);
            record.error = Some(e.to_string());
            record
        }
    }
}

/// Dispatches the whole batch, one repository at a time.
pub async fn trigger_all<A: WorkflowApi>(
    api: &A,
    targets: &[ScanTarget],
    dry_run: bool,
) -> Vec<RunRecord> {
    let mut records = Vec::with_capacity(targets.len());
    for target in targets {
        let record = trigger_workflow(
            api,
            &target.name,
            &target.workflow_file,
            &target.branch,
            dry_run,
        )
        .await;
        records.push(record);
    }
    records
}

/// Best-effort run-id resolution for triggered records.
///
/// Waits a fixed grace delay, then for each triggered record takes the
/// first of the workflow's newest runs created at or after the trigger
/// timestamp. Two dispatches to the same repository inside the window are
/// inherently ambiguous; no tie-break is attempted. A record left without
/// a run id is a valid unresolved state, not an error.
pub async fn resolve_run_ids<A: WorkflowApi, C: Clock>(
    api: &A,
    clock: &C,
    records: &mut [RunRecord],
    trigger_time: DateTime<Utc>,
) {
    if !records
        .iter()
        .any(|r| r.status == DispatchStatus::Triggered)
    {
        return;
    }

    info!("Waiting for runs to be registered...");
    clock.sleep(RUN_REGISTRATION_DELAY).await;

    for record in records
        .iter_mut()
        .filter(|r| r.status == DispatchStatus::Triggered)
    {
        match api
            .list_workflow_runs(&record.repo, &record.workflow_file, RUN_LOOKUP_WINDOW)
            .await
        {
            Ok(runs) => {
                let matched = runs.iter().find(|run| run.created_at >= trigger_time);
                match matched {
                    Some(run) => {
                        record.set_run_id(run.id);
                        println!("  {}: run_id={}", record.repo, run.id);
                    }
                    None => {
                        println!("  {}: could not get run_id", record.repo);
                    }
                }
            }
            Err(e) => {
                warn!("Error getting run id for {}: {}", record.repo, e);
                println!("  {}: could not get run_id", record.repo);
            }
        }
    }
}
