//! Poll-to-completion loop for dispatched runs.
//!
//! Records without a run id are excluded from polling and counted
//! separately; everything else is queried once per round until completed
//! or the wall-clock deadline elapses. A failed status query leaves the
//! record unchanged for that round.

use crate::clock::Clock;
use crate::github::WorkflowApi;
use crate::models::RunRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, warn};

/// Options for the poll loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Overall wall-clock deadline. Zero performs at most one status check
    /// per record and returns without sleeping.
    pub timeout: Duration,
    /// Delay between rounds.
    pub poll_interval: Duration,
    /// Whether to show a progress bar between rounds.
    pub show_progress: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(30),
            show_progress: true,
        }
    }
}

/// Polls all resolvable records until completed or the deadline elapses.
///
/// Records are mutated in place and reflect their best-known state when
/// the function returns; the loop never blocks past the deadline. There is
/// no synchronized sampling across repositories - each record's state is
/// whatever its last individual query reported.
pub async fn wait_for_completion<A: WorkflowApi, C: Clock>(
    api: &A,
    clock: &C,
    records: &mut [RunRecord],
    options: &PollOptions,
) {
    let pending_total = records.iter().filter(|r| r.run_id.is_some()).count();
    let unresolved = records.len() - pending_total;

    if pending_total == 0 {
        println!("No runs to wait for");
        return;
    }

    println!("Waiting for {} runs to complete...", pending_total);
    if unresolved > 0 {
        debug!("{} records have no run id and are not polled", unresolved);
    }

    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new(pending_total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} completed")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start = clock.now();

    loop {
        let mut completed_count = 0;

        for record in records.iter_mut() {
            let Some(run_id) = record.run_id else {
                continue;
            };
            if record.is_completed() {
                completed_count += 1;
                continue;
            }

            match api.get_workflow_run(&record.repo, run_id).await {
                Ok(run) => {
                    if run.is_completed() {
                        record.mark_completed(run.conclusion);
                        completed_count += 1;
                        println!(
                            "  {}: completed ({})",
                            record.repo,
                            record.conclusion.as_deref().unwrap_or("unknown")
                        );
                    } else {
                        record.mark_in_progress();
                    }
                }
                Err(e) => {
                    // Transient; the record keeps its last known state.
                    warn!("Status query failed for {}: {}", record.repo, e);
                }
            }
        }

        if let Some(ref pb) = progress_bar {
            pb.set_position(completed_count as u64);
        }

        if completed_count == pending_total {
            println!("All {} runs completed", pending_total);
            break;
        }

        if clock.now().duration_since(start) >= options.timeout {
            println!(
                "Timeout reached, {}/{} runs completed",
                completed_count, pending_total
            );
            break;
        }

        clock.sleep(options.poll_interval).await;
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::github::{Artifact, GithubError, WorkflowRun};
    use crate::models::{DispatchStatus, PollStatus};
    use chrono::Utc;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Scripted status source: each run id maps to a sequence of answers,
    /// one consumed per query. `Err` entries simulate transient failures.
    struct ScriptedApi {
        responses: RefCell<HashMap<u64, Vec<Result<WorkflowRun, ()>>>>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                responses: RefCell::new(HashMap::new()),
            }
        }

        fn script(&mut self, run_id: u64, answers: Vec<Result<WorkflowRun, ()>>) {
            self.responses.borrow_mut().insert(run_id, answers);
        }
    }

    fn run(id: u64, status: &str, conclusion: Option<&str>) -> WorkflowRun {
        WorkflowRun {
            id,
            status: status.to_string(),
            conclusion: conclusion.map(String::from),
            created_at: Utc::now(),
        }
    }

    fn query_error() -> GithubError {
        GithubError::Status {
            status: 500,
            url: "https://api.github.com/test".to_string(),
            body: "boom".to_string(),
        }
    }

    impl WorkflowApi for ScriptedApi {
        async fn create_dispatch(
            &self,
            _repo: &str,
            _workflow_file: &str,
            _branch: &str,
        ) -> Result<bool, GithubError> {
            Ok(true)
        }

        async fn list_workflow_runs(
            &self,
            _repo: &str,
            _workflow_file: &str,
            _limit: usize,
        ) -> Result<Vec<WorkflowRun>, GithubError> {
            Ok(Vec::new())
        }

        async fn get_workflow_run(
            &self,
            _repo: &str,
            run_id: u64,
        ) -> Result<WorkflowRun, GithubError> {
            let mut responses = self.responses.borrow_mut();
            let answers = responses.get_mut(&run_id).expect("unscripted run id");
            assert!(!answers.is_empty(), "run {} queried too many times", run_id);
            answers.remove(0).map_err(|_| query_error())
        }

        async fn list_artifacts(
            &self,
            _repo: &str,
            _run_id: u64,
        ) -> Result<Vec<Artifact>, GithubError> {
            Ok(Vec::new())
        }

        async fn download_artifact(
            &self,
            _repo: &str,
            _artifact_id: u64,
        ) -> Result<Vec<u8>, GithubError> {
            Err(query_error())
        }
    }

    fn record_with_run_id(repo: &str, run_id: Option<u64>) -> RunRecord {
        let mut record = RunRecord::new(repo, "scan.yml", "main", DispatchStatus::Triggered);
        if let Some(id) = run_id {
            record.set_run_id(id);
        }
        record
    }

    fn options(timeout_secs: u64) -> PollOptions {
        PollOptions {
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_secs(30),
            show_progress: false,
        }
    }

    #[tokio::test]
    async fn test_all_complete_stops_without_timeout() {
        let mut api = ScriptedApi::new();
        api.script(
            1,
            vec![
                Ok(run(1, "in_progress", None)),
                Ok(run(1, "completed", Some("success"))),
            ],
        );
        api.script(2, vec![Ok(run(2, "completed", Some("failure")))]);

        let mut records = vec![
            record_with_run_id("acme/one", Some(1)),
            record_with_run_id("acme/two", Some(2)),
        ];

        let clock = ManualClock::new();
        wait_for_completion(&api, &clock, &mut records, &options(3600)).await;

        assert!(records.iter().all(|r| r.is_completed()));
        assert_eq!(records[0].conclusion.as_deref(), Some("success"));
        assert_eq!(records[1].conclusion.as_deref(), Some("failure"));
        // Two rounds, one sleep in between.
        assert_eq!(clock.total_slept(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_zero_deadline_checks_once_and_never_sleeps() {
        let mut api = ScriptedApi::new();
        api.script(1, vec![Ok(run(1, "in_progress", None))]);
        api.script(2, vec![Err(())]);

        let mut records = vec![
            record_with_run_id("acme/one", Some(1)),
            record_with_run_id("acme/two", Some(2)),
        ];

        let clock = ManualClock::new();
        wait_for_completion(&api, &clock, &mut records, &options(0)).await;

        assert_eq!(clock.total_slept(), Duration::ZERO);
        assert_eq!(records[0].poll_status, PollStatus::InProgress);
        // The failed query left the record in its initial state.
        assert_eq!(records[1].poll_status, PollStatus::Unknown);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_next_round() {
        let mut api = ScriptedApi::new();
        api.script(
            1,
            vec![Err(()), Ok(run(1, "completed", Some("success")))],
        );

        let mut records = vec![record_with_run_id("acme/one", Some(1))];

        let clock = ManualClock::new();
        wait_for_completion(&api, &clock, &mut records, &options(3600)).await;

        assert!(records[0].is_completed());
        assert_eq!(records[0].conclusion.as_deref(), Some("success"));
    }

    #[tokio::test]
    async fn test_unresolved_records_are_not_polled() {
        let api = ScriptedApi::new();
        // No scripted responses: any query would panic.
        let mut records = vec![record_with_run_id("acme/one", None)];

        let clock = ManualClock::new();
        wait_for_completion(&api, &clock, &mut records, &options(3600)).await;

        assert_eq!(records[0].poll_status, PollStatus::Unknown);
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_deadline_stops_loop_with_pending_work() {
        let mut api = ScriptedApi::new();
        // Enough in-progress answers for exactly three rounds (0s, 30s, 60s).
        api.script(
            1,
            vec![
                Ok(run(1, "in_progress", None)),
                Ok(run(1, "in_progress", None)),
                Ok(run(1, "in_progress", None)),
            ],
        );

        let mut records = vec![record_with_run_id("acme/one", Some(1))];

        let clock = ManualClock::new();
        wait_for_completion(&api, &clock, &mut records, &options(60)).await;

        assert_eq!(records[0].poll_status, PollStatus::InProgress);
        assert_eq!(clock.total_slept(), Duration::from_secs(60));
    }
}
