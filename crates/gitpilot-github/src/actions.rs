use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    client::{GithubClient, RepoRef},
    files::FileCommit,
    GithubError,
};

pub const DEFAULT_SUMMARY_ARTIFACT: &str = "SummaryResult";
pub const SUMMARY_FILE_NAME: &str = "summary.md";

#[derive(Debug, Deserialize)]
struct ArtifactsResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    name: String,
    archive_download_url: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    head_branch: Option<String>,
    head_commit: Option<HeadCommit>,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct HeadCommit {
    message: String,
}

/// Condensed view of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRunSummary {
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub branch: Option<String>,
    pub commit_message: String,
    pub url: String,
}

impl GithubClient {
    /// Downloads the named artifact and returns the `summary.md` it carries.
    pub async fn get_actions_results(
        &self,
        repo: &RepoRef,
        artifact_name: &str,
    ) -> Result<String, GithubError> {
        let url = self.repo_endpoint(repo, ["actions", "artifacts"])?;
        let listing: ArtifactsResponse = self
            .request_json("list artifacts", || {
                self.http.get(url.clone()).query(&[("per_page", "100")])
            })
            .await?;
        let artifact = listing
            .artifacts
            .into_iter()
            .find(|artifact| artifact.name == artifact_name)
            .ok_or_else(|| GithubError::ArtifactNotFound(artifact_name.to_string()))?;

        let archive = self
            .request_bytes("download artifact", || {
                self.http.get(artifact.archive_download_url.as_str())
            })
            .await?;
        tracing::debug!(repo = %repo.as_slug(), artifact_name, bytes = archive.len(), "artifact downloaded");

        let workdir = self.artifact_workdir.clone();
        tokio::task::spawn_blocking(move || read_summary_from_archive(&archive, workdir.as_deref()))
            .await
            .map_err(|error| GithubError::Io(std::io::Error::other(error.to_string())))?
    }

    /// Writes `.github/workflows/<workflow_name>`.
    pub async fn create_or_update_workflow(
        &self,
        repo: &RepoRef,
        workflow_name: &str,
        content: &str,
        branch: &str,
    ) -> Result<FileCommit, GithubError> {
        let workflow_name = workflow_name.trim_matches('/');
        if workflow_name.is_empty() {
            return Err(GithubError::InvalidArgument(
                "workflow name must not be empty".to_string(),
            ));
        }
        self.create_or_update_file(
            repo,
            &format!(".github/workflows/{workflow_name}"),
            content,
            &format!("Update GitHub Action workflow: {workflow_name}"),
            branch,
        )
        .await
    }

    /// Lists recent workflow runs of the repository.
    pub async fn list_workflow_runs(
        &self,
        repo: &RepoRef,
    ) -> Result<Vec<WorkflowRunSummary>, GithubError> {
        let url = self.repo_endpoint(repo, ["actions", "runs"])?;
        let response: WorkflowRunsResponse = self
            .request_json("list workflow runs", || self.http.get(url.clone()))
            .await?;
        Ok(response
            .workflow_runs
            .into_iter()
            .map(|run| WorkflowRunSummary {
                id: run.id,
                name: run.name,
                status: run.status,
                conclusion: run.conclusion,
                branch: run.head_branch,
                commit_message: run
                    .head_commit
                    .map(|commit| commit.message)
                    .unwrap_or_else(|| "N/A".to_string()),
                url: run.html_url,
            })
            .collect())
    }
}

/// Extracts `archive` into a fresh temporary directory and reads its `summary.md`.
///
/// The directory is removed when this returns, whatever the outcome.
pub fn read_summary_from_archive(
    archive: &[u8],
    workdir: Option<&Path>,
) -> Result<String, GithubError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("gitpilot-artifact-");
    let extraction = match workdir {
        Some(root) => builder.tempdir_in(root)?,
        None => builder.tempdir()?,
    };

    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    zip.extract(extraction.path())?;

    let summary_path: PathBuf = extraction.path().join(SUMMARY_FILE_NAME);
    if !summary_path.is_file() {
        return Err(GithubError::NotFound(format!(
            "artifact does not contain {SUMMARY_FILE_NAME}"
        )));
    }
    let summary = std::fs::read_to_string(&summary_path)?;
    extraction.close()?;
    Ok(summary)
}
