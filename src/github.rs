//! GitHub Actions REST API client.
//!
//! This module wraps the handful of GitHub endpoints the orchestrator
//! needs: workflow dispatch, run listing/status, and artifact
//! listing/download. Remote failures surface as [`GithubError`] values so
//! callers can capture them per repository instead of aborting the batch.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("nimfleet/", env!("CARGO_PKG_VERSION"));

/// Request timeout; artifact downloads can be large.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body carried into a [`GithubError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// Error from a remote GitHub call.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The API answered with an error status.
    #[error("GitHub API returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    /// The request never completed (connect, timeout, TLS, ...).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A workflow run as returned by the runs endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    /// "queued", "in_progress", or "completed".
    pub status: String,
    /// Set once the run is completed ("success", "failure", ...).
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// An artifact produced by a workflow run.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct ArtifactsResponse {
    artifacts: Vec<Artifact>,
}

/// The remote operations the orchestration phases depend on.
///
/// The dispatcher, poll loop, and collector take this seam instead of the
/// concrete client so tests can drive them with in-memory fakes.
#[allow(async_fn_in_trait)]
pub trait WorkflowApi {
    /// Asks GitHub to start `workflow_file` on `branch`.
    ///
    /// `Ok(true)` means the dispatch endpoint accepted (HTTP 204);
    /// `Ok(false)` means it answered with another success status without
    /// accepting. Error statuses and transport failures are `Err`.
    async fn create_dispatch(
        &self,
        repo: &str,
        workflow_file: &str,
        branch: &str,
    ) -> Result<bool, GithubError>;

    /// Lists the workflow's most recent runs, newest first.
    async fn list_workflow_runs(
        &self,
        repo: &str,
        workflow_file: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, GithubError>;

    /// Fetches the current state of a single run.
    async fn get_workflow_run(&self, repo: &str, run_id: u64)
        -> Result<WorkflowRun, GithubError>;

    /// Lists the artifacts produced by a run.
    async fn list_artifacts(&self, repo: &str, run_id: u64) -> Result<Vec<Artifact>, GithubError>;

    /// Downloads an artifact's ZIP archive.
    async fn download_artifact(&self, repo: &str, artifact_id: u64)
        -> Result<Vec<u8>, GithubError>;
}

/// Concrete client over the GitHub REST API.
pub struct GithubClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    /// Creates a client authenticated with the given bearer token.
    pub fn new(token: String) -> Result<Self, GithubError> {
        Self::with_base_url(token, API_BASE.to_string())
    }

    /// Creates a client against a non-default API base URL.
    pub fn with_base_url(token: String, base_url: String) -> Result<Self, GithubError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            token,
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Maps an error-status response to `GithubError::Status`, truncating
    /// the body so error messages stay readable.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GithubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = truncate_error_body(response.text().await.unwrap_or_default());

        Err(GithubError::Status {
            status: status.as_u16(),
            url,
            body,
        })
    }
}

/// Cuts an error body down to [`ERROR_BODY_LIMIT`] bytes, backing off to
/// the nearest char boundary so multi-byte bodies never panic.
fn truncate_error_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

impl WorkflowApi for GithubClient {
    async fn create_dispatch(
        &self,
        repo: &str,
        workflow_file: &str,
        branch: &str,
    ) -> Result<bool, GithubError> {
        let url = format!(
            "{}/repos/{}/actions/workflows/{}/dispatches",
            self.base_url, repo, workflow_file
        );
        debug!("POST {}", url);

        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&serde_json::json!({ "ref": branch }))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(response.status() == reqwest::StatusCode::NO_CONTENT)
    }

    async fn list_workflow_runs(
        &self,
        repo: &str,
        workflow_file: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, GithubError> {
        let url = format!(
            "{}/repos/{}/actions/workflows/{}/runs?per_page={}",
            self.base_url, repo, workflow_file, limit
        );
        debug!("GET {}", url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: WorkflowRunsResponse = response.json().await?;

        Ok(parsed.workflow_runs)
    }

    async fn get_workflow_run(
        &self,
        repo: &str,
        run_id: u64,
    ) -> Result<WorkflowRun, GithubError> {
        let url = format!("{}/repos/{}/actions/runs/{}", self.base_url, repo, run_id);
        debug!("GET {}", url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let response = Self::check_status(response).await?;

        Ok(response.json().await?)
    }

    async fn list_artifacts(&self, repo: &str, run_id: u64) -> Result<Vec<Artifact>, GithubError> {
        let url = format!(
            "{}/repos/{}/actions/runs/{}/artifacts",
            self.base_url, repo, run_id
        );
        debug!("GET {}", url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let response = Self::check_status(response).await?;
        let parsed: ArtifactsResponse = response.json().await?;

        Ok(parsed.artifacts)
    }

    async fn download_artifact(
        &self,
        repo: &str,
        artifact_id: u64,
    ) -> Result<Vec<u8>, GithubError> {
        // The endpoint redirects to blob storage; reqwest follows it.
        let url = format!(
            "{}/repos/{}/actions/artifacts/{}/zip",
            self.base_url, repo, artifact_id
        );
        debug!("GET {}", url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;

        Ok(bytes.to_vec())
    }
}
