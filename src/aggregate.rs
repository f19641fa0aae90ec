//! Report discovery and aggregation.
//!
//! Loads per-repository scan reports from the collection output directory
//! and merges them into one fleet-wide summary. Aggregation itself is a
//! pure function of the loaded reports (plus the clock for the metadata
//! stamp); discovery handles the filesystem.

use crate::models::{AggregateMetadata, AggregateSummary, AggregatedReport, ScanReport};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Canonical report filename inside a collected repository directory.
pub const REPORT_FILENAME: &str = "nim-scan-report.json";

/// A report together with where discovery found it.
///
/// The provenance never leaves this wrapper; only the inner report is
/// embedded in the aggregate, so the persisted schema is independent of
/// the discovery path.
#[derive(Debug, Clone)]
pub struct LoadedReport {
    pub report: ScanReport,
    pub source_dir: PathBuf,
    pub source_file: String,
}

/// Loads scan reports from every repository directory under `reports_dir`.
///
/// Each directory is checked for the canonical report filename first; if
/// absent, every JSON file whose name contains a case-insensitive "report"
/// token is loaded, each becoming one independent report. Unreadable
/// candidates are logged and skipped.
pub fn load_reports(reports_dir: &Path) -> Vec<LoadedReport> {
    let mut reports = Vec::new();

    if !reports_dir.exists() {
        warn!("Reports directory not found: {}", reports_dir.display());
        return reports;
    }

    let mut repo_dirs: Vec<PathBuf> = match std::fs::read_dir(reports_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| !dir_name(path).starts_with('.'))
            .collect(),
        Err(e) => {
            warn!("Cannot read {}: {}", reports_dir.display(), e);
            return reports;
        }
    };
    // Directory iteration order is platform-dependent; sort for a stable
    // discovery order.
    repo_dirs.sort();

    for repo_dir in repo_dirs {
        let canonical = repo_dir.join(REPORT_FILENAME);
        if canonical.exists() {
            if let Some(report) = load_report_file(&canonical) {
                println!("  Loaded: {}", dir_name(&repo_dir));
                reports.push(LoadedReport {
                    report,
                    source_dir: repo_dir.clone(),
                    source_file: REPORT_FILENAME.to_string(),
                });
            }
            continue;
        }

        for candidate in json_report_candidates(&repo_dir) {
            if let Some(report) = load_report_file(&candidate) {
                let file_name = candidate
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!("  Loaded: {}/{}", dir_name(&repo_dir), file_name);
                reports.push(LoadedReport {
                    report,
                    source_dir: repo_dir.clone(),
                    source_file: file_name,
                });
            }
        }
    }

    reports
}

/// JSON files in the directory whose name contains a case-insensitive
/// "report" token, sorted by name.
fn json_report_candidates(repo_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(repo_dir) else {
        return Vec::new();
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().to_lowercase().contains("report"))
        })
        .collect();
    candidates.sort();
    candidates
}

fn load_report_file(path: &Path) -> Option<ScanReport> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Error loading {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(report) => Some(report),
        Err(e) => {
            warn!("Error parsing {}: {}", path.display(), e);
            None
        }
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Derives the mutually exclusive support-type bucket for a report.
pub fn support_type(report: &ScanReport) -> &'static str {
    match (report.supports_local_nim(), report.supports_hosted_nim()) {
        (true, true) => "both",
        (true, false) => "local_only",
        (false, true) => "hosted_only",
        (false, false) => "none",
    }
}

/// Derives the mutually exclusive actions-usage bucket for a report.
pub fn actions_usage(report: &ScanReport) -> &'static str {
    match (
        report.uses_local_nim_in_actions(),
        report.uses_hosted_nim_in_actions(),
    ) {
        (true, true) => "both_in_actions",
        (true, false) => "local_in_actions",
        (false, true) => "hosted_in_actions",
        (false, false) => "none_in_actions",
    }
}

/// Merges loaded reports into the fleet-wide aggregate.
///
/// Pure: the same reports and timestamp always produce the same document.
/// Zero input reports yield a well-formed aggregate with empty tables and
/// zero counts.
pub fn aggregate(reports: &[LoadedReport], now: DateTime<Utc>) -> AggregatedReport {
    let mut summary = AggregateSummary::default();

    for loaded in reports {
        let report = &loaded.report;
        debug!(
            "Aggregating {} from {}/{}",
            report.repo_name(),
            loaded.source_dir.display(),
            loaded.source_file
        );

        *summary
            .by_classification
            .entry(report.classification().to_string())
            .or_insert(0) += 1;
        *summary
            .by_support_type
            .entry(support_type(report).to_string())
            .or_insert(0) += 1;
        *summary
            .by_actions_usage
            .entry(actions_usage(report).to_string())
            .or_insert(0) += 1;
    }

    AggregatedReport {
        metadata: AggregateMetadata {
            aggregation_time: now,
            total_repos: reports.len(),
            successful_scans: reports.len(),
        },
        summary,
        repositories: reports.iter().map(|l| l.report.clone()).collect(),
    }
}
