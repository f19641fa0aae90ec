//! Artifact collection for completed runs.
//!
//! For each completed record the run's artifacts are listed, matched
//! against the report artifact tokens, and downloaded/extracted into a
//! repo-scoped directory. Every repository is handled independently.

use crate::github::{Artifact, WorkflowApi};
use crate::models::{repo_dir_name, CollectionResult, CollectionStatus, RunRecord};
use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Token identifying the canonical report artifact.
pub const REPORT_ARTIFACT_TOKEN: &str = "nim-scan-report";

/// Fallback tokens, consulted only when no canonical artifact matched.
pub const FALLBACK_ARTIFACT_TOKENS: &[&str] = &["docker-image-report", "hosted-nim-report"];

/// Collects report artifacts for a single record.
///
/// Skip preconditions produce their own terminal status with no remote
/// call made. A failure downloading one artifact is recorded and does not
/// abort the remaining downloads; the final status reflects whether at
/// least one artifact of the winning tier succeeded.
pub async fn collect_artifacts<A: WorkflowApi>(
    api: &A,
    record: &RunRecord,
    output_dir: &Path,
) -> CollectionResult {
    let repo = record.repo.as_str();

    let Some(run_id) = record.run_id else {
        println!("  {}: no run_id, skipping", repo);
        return CollectionResult::bare(repo, CollectionStatus::SkippedNoRunId);
    };

    if !record.is_completed() {
        println!("  {}: not completed, skipping", repo);
        return CollectionResult::bare(repo, CollectionStatus::SkippedNotCompleted);
    }

    println!("  {}: collecting artifacts...", repo);

    let artifacts = match api.list_artifacts(repo, run_id).await {
        Ok(artifacts) => artifacts,
        Err(e) => {
            println!("    Error: {}", e);
            let mut result = CollectionResult::bare(repo, CollectionStatus::Error);
            result.error = Some(e.to_string());
            return result;
        }
    };

    let primary: Vec<&Artifact> = artifacts
        .iter()
        .filter(|a| a.name.contains(REPORT_ARTIFACT_TOKEN))
        .collect();

    let (matched, matched_primary) = if !primary.is_empty() {
        (primary, true)
    } else {
        let fallback: Vec<&Artifact> = artifacts
            .iter()
            .filter(|a| {
                FALLBACK_ARTIFACT_TOKENS
                    .iter()
                    .any(|token| a.name.contains(token))
            })
            .collect();
        (fallback, false)
    };

    if matched.is_empty() {
        return CollectionResult::bare(repo, CollectionStatus::NoArtifacts);
    }

    let repo_dir = output_dir.join(repo_dir_name(repo));
    if let Err(e) = std::fs::create_dir_all(&repo_dir) {
        let mut result = CollectionResult::bare(repo, CollectionStatus::Error);
        result.error = Some(format!(
            "failed to create {}: {}",
            repo_dir.display(),
            e
        ));
        return result;
    }

    let mut downloaded = Vec::new();
    let mut failures = Vec::new();

    for artifact in matched {
        println!("    Found: {}", artifact.name);
        match download_and_extract(api, repo, artifact, &repo_dir).await {
            Ok(()) => downloaded.push(artifact.name.clone()),
            Err(e) => {
                println!("    Error downloading artifact: {:#}", e);
                failures.push(format!("{}: {:#}", artifact.name, e));
            }
        }
    }

    let status = if downloaded.is_empty() {
        CollectionStatus::NoArtifacts
    } else if matched_primary {
        CollectionStatus::Collected
    } else {
        CollectionStatus::Partial
    };

    CollectionResult {
        repo: repo.to_string(),
        status,
        output_dir: Some(repo_dir.to_string_lossy().into_owned()),
        artifacts: downloaded,
        error: if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        },
    }
}

/// Collects artifacts for every record, one repository at a time.
pub async fn collect_all<A: WorkflowApi>(
    api: &A,
    records: &[RunRecord],
    output_dir: &Path,
) -> Vec<CollectionResult> {
    let mut results = Vec::with_capacity(records.len());
    for record in records {
        results.push(collect_artifacts(api, record, output_dir).await);
    }
    results
}

/// Downloads one artifact archive and extracts it into the repo directory.
async fn download_and_extract<A: WorkflowApi>(
    api: &A,
    repo: &str,
    artifact: &Artifact,
    repo_dir: &Path,
) -> Result<()> {
    let bytes = api
        .download_artifact(repo, artifact.id)
        .await
        .with_context(|| format!("download failed for artifact {}", artifact.id))?;

    debug!(
        "Extracting {} ({} bytes) into {}",
        artifact.name,
        bytes.len(),
        repo_dir.display()
    );

    extract_zip(&bytes, repo_dir)
        .with_context(|| format!("extraction failed for artifact {}", artifact.name))?;

    Ok(())
}

/// Extracts a ZIP archive held in memory into the target directory.
fn extract_zip(bytes: &[u8], target: &Path) -> Result<()> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("not a valid ZIP archive")?;
    archive
        .extract(target)
        .with_context(|| format!("failed to extract into {}", target.display()))?;
    Ok(())
}
