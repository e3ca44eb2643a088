use serde_json::Value;

use crate::{
    client::{GithubClient, RepoRef},
    files::{decode_contents_payload, FileCommit, RepoFile},
    GithubError,
};

impl GithubClient {
    /// Reads the README GitHub resolves for `branch`, whatever its file name.
    pub async fn get_readme(&self, repo: &RepoRef, branch: &str) -> Result<RepoFile, GithubError> {
        let url = self.repo_endpoint(repo, ["readme"])?;
        let payload: Value = self
            .request_json("get readme", || {
                self.http.get(url.clone()).query(&[("ref", branch)])
            })
            .await?;
        decode_contents_payload(&payload, "README.md")
    }

    /// Replaces the existing README in place, keeping its path.
    pub async fn update_readme(
        &self,
        repo: &RepoRef,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<FileCommit, GithubError> {
        let current = self.get_readme(repo, branch).await?;
        self.put_contents(
            repo,
            &current.path,
            content,
            message,
            branch,
            Some(current.sha.as_str()),
        )
        .await
    }

    pub async fn create_readme(
        &self,
        repo: &RepoRef,
        content: &str,
        branch: &str,
    ) -> Result<FileCommit, GithubError> {
        self.create_or_update_file(repo, "README.md", content, "Create README.md", branch)
            .await
    }
}
