//! Data models for the scan orchestrator.
//!
//! This module contains the core data structures shared by the trigger,
//! collect, and aggregate phases, plus the JSON shapes persisted between
//! phase invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a workflow dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Dry-run mode - no remote call was made.
    DryRun,
    /// The dispatch endpoint accepted the request.
    Triggered,
    /// The dispatch endpoint answered without accepting (non-204 success).
    Failed,
    /// The remote call itself failed.
    Error,
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStatus::DryRun => write!(f, "dry_run"),
            DispatchStatus::Triggered => write!(f, "triggered"),
            DispatchStatus::Failed => write!(f, "failed"),
            DispatchStatus::Error => write!(f, "error"),
        }
    }
}

/// Best-known state of a dispatched run, as seen by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Never successfully queried.
    #[default]
    Unknown,
    /// Queried at least once, not yet finished.
    InProgress,
    /// The run reached a terminal state.
    Completed,
}

/// Per-repository dispatch and poll state.
///
/// Created once by the dispatcher, mutated only by the poll loop, read
/// (never mutated) by the artifact collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Repository identifier in "owner/name" form.
    pub repo: String,
    /// Workflow file that was dispatched.
    pub workflow_file: String,
    /// Branch the workflow was dispatched on.
    pub branch: String,
    /// Dispatch outcome; independent of poll status.
    pub status: DispatchStatus,
    /// Resolved run id. Absent means the run-id lookup found nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    /// Captured remote error message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the dispatch was attempted.
    pub triggered_at: DateTime<Utc>,
    /// Last observed run status.
    #[serde(default)]
    pub poll_status: PollStatus,
    /// Conclusion reported by the run once completed (success, failure, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
}

impl RunRecord {
    /// Creates a record for a dispatch attempt made now.
    pub fn new(repo: &str, workflow_file: &str, branch: &str, status: DispatchStatus) -> Self {
        Self {
            repo: repo.to_string(),
            workflow_file: workflow_file.to_string(),
            branch: branch.to_string(),
            status,
            run_id: None,
            error: None,
            triggered_at: Utc::now(),
            poll_status: PollStatus::default(),
            conclusion: None,
        }
    }

    /// Sets the run id. A run id is resolved at most once; later calls
    /// are ignored.
    pub fn set_run_id(&mut self, run_id: u64) {
        if self.run_id.is_none() {
            self.run_id = Some(run_id);
        }
    }

    /// Whether the poll loop has seen this run finish.
    pub fn is_completed(&self) -> bool {
        self.poll_status == PollStatus::Completed
    }

    /// Marks the run as still executing. A completed record never regresses.
    pub fn mark_in_progress(&mut self) {
        if self.poll_status != PollStatus::Completed {
            self.poll_status = PollStatus::InProgress;
        }
    }

    /// Marks the run as finished with the given conclusion. Terminal.
    pub fn mark_completed(&mut self, conclusion: Option<String>) {
        if self.poll_status != PollStatus::Completed {
            self.poll_status = PollStatus::Completed;
            self.conclusion = conclusion;
        }
    }
}

/// Output document written by the trigger phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerOutput {
    pub trigger_time: DateTime<Utc>,
    pub total_repos: usize,
    pub triggered: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub runs: Vec<RunRecord>,
}

impl TriggerOutput {
    /// Builds the trigger summary from a batch of dispatch records.
    pub fn from_records(trigger_time: DateTime<Utc>, dry_run: bool, runs: Vec<RunRecord>) -> Self {
        let triggered = runs
            .iter()
            .filter(|r| r.status == DispatchStatus::Triggered)
            .count();
        let failed = runs
            .iter()
            .filter(|r| matches!(r.status, DispatchStatus::Failed | DispatchStatus::Error))
            .count();

        Self {
            trigger_time,
            total_repos: runs.len(),
            triggered,
            failed,
            dry_run,
            runs,
        }
    }

    /// Whether the collect phase has anything to act on. Dry-run output
    /// records what would have happened, so there are no real runs behind
    /// it and nothing to collect.
    pub fn is_collectable(&self) -> bool {
        !self.dry_run && !self.runs.is_empty()
    }
}

/// Terminal outcome of artifact collection for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// No run id was resolved for the record; nothing to collect.
    SkippedNoRunId,
    /// The run never reached a completed state before collection.
    SkippedNotCompleted,
    /// At least one canonical report artifact was downloaded.
    Collected,
    /// Only fallback artifacts were found and downloaded.
    Partial,
    /// Artifacts were listed but nothing usable was downloaded.
    NoArtifacts,
    /// Listing the artifacts failed.
    Error,
}

/// Result of collecting artifacts for one repository. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub repo: String,
    pub status: CollectionStatus,
    /// Repo-scoped directory the artifacts were extracted into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Names of the artifacts that were successfully downloaded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// Listing or download failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionResult {
    /// Creates a result with no output directory and no artifacts.
    pub fn bare(repo: &str, status: CollectionStatus) -> Self {
        Self {
            repo: repo.to_string(),
            status,
            output_dir: None,
            artifacts: Vec::new(),
            error: None,
        }
    }
}

/// Counts over a batch of collection results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collected: usize,
    pub partial: usize,
    pub failed: usize,
}

impl CollectionSummary {
    pub fn from_results(results: &[CollectionResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                CollectionStatus::Collected => summary.collected += 1,
                CollectionStatus::Partial => summary.partial += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}

/// Output document written by the collect phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionOutput {
    pub collection_time: DateTime<Utc>,
    pub output_dir: String,
    pub results: Vec<CollectionResult>,
    pub summary: CollectionSummary,
}

/// The boolean summary block of a scan report.
///
/// Every field is optional on the wire; defaults are applied by the
/// accessors on [`ScanReport`], never at storage time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_local_nim: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_hosted_nim: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses_local_nim_in_actions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses_hosted_nim_in_actions: Option<bool>,
    /// Any other summary fields pass through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Metadata block of a scan report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A per-repository scan report as produced by the remote workflow.
///
/// Loosely structured: only the fields consumed by aggregation are typed,
/// everything else round-trips through the flattened maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ScanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScanMetadata>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScanReport {
    /// Classification label, defaulting to "UNKNOWN".
    pub fn classification(&self) -> &str {
        self.classification.as_deref().unwrap_or("UNKNOWN")
    }

    /// Classification description, defaulting to empty.
    pub fn classification_description(&self) -> &str {
        self.classification_description.as_deref().unwrap_or("")
    }

    /// Repository name from the metadata block, defaulting to "Unknown".
    pub fn repo_name(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.repo_name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn supports_local_nim(&self) -> bool {
        self.summary_flag(|s| s.supports_local_nim)
    }

    pub fn supports_hosted_nim(&self) -> bool {
        self.summary_flag(|s| s.supports_hosted_nim)
    }

    pub fn uses_local_nim_in_actions(&self) -> bool {
        self.summary_flag(|s| s.uses_local_nim_in_actions)
    }

    pub fn uses_hosted_nim_in_actions(&self) -> bool {
        self.summary_flag(|s| s.uses_hosted_nim_in_actions)
    }

    fn summary_flag(&self, pick: impl Fn(&ScanSummary) -> Option<bool>) -> bool {
        self.summary.as_ref().and_then(pick).unwrap_or(false)
    }
}

/// Metadata block of the aggregated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetadata {
    pub aggregation_time: DateTime<Utc>,
    pub total_repos: usize,
    pub successful_scans: usize,
}

/// The three independent tally tables. BTreeMaps keep key order stable so
/// repeated aggregations of the same input serialize identically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub by_classification: BTreeMap<String, usize>,
    pub by_support_type: BTreeMap<String, usize>,
    pub by_actions_usage: BTreeMap<String, usize>,
}

/// The final fleet-wide report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub metadata: AggregateMetadata,
    pub summary: AggregateSummary,
    /// Cleaned reports in discovery order; duplicates allowed when a
    /// repository directory held several candidate files.
    pub repositories: Vec<ScanReport>,
}

/// Turns a repository identifier into a filesystem-safe directory name.
///
/// The single path separator becomes `__`. GitHub owner names cannot
/// contain underscores, so splitting on the first `__` recovers the
/// identifier and distinct identifiers never collide.
pub fn repo_dir_name(repo: &str) -> String {
    repo.replace('/', "__")
}

/// Reverses [`repo_dir_name`]. Returns `None` for names that were not
/// produced by the transform.
#[allow(dead_code)] // Utility proving the transform reversible
pub fn repo_from_dir_name(dir_name: &str) -> Option<String> {
    let (owner, name) = dir_name.split_once("__")?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{}/{}", owner, name))
}
