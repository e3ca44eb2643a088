use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{client::GithubClient, GithubError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub updated_at: Option<String>,
}

impl GithubClient {
    /// Lists every repository of `owner`, most recently updated first.
    pub async fn list_repositories(
        &self,
        owner: &str,
        per_page: u32,
    ) -> Result<Vec<RepositorySummary>, GithubError> {
        let per_page = per_page.clamp(1, 100);
        let url = self.endpoint(["users", owner, "repos"])?;
        let per_page_value = per_page.to_string();
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<RepositorySummary> = self
                .request_json("list repositories", || {
                    self.http.get(url.clone()).query(&[
                        ("per_page", per_page_value.as_str()),
                        ("sort", "updated"),
                        ("direction", "desc"),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < per_page as usize {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }
}

/// Renders repositories as the prose listing handed back to the model.
pub fn render_repository_listing(owner: &str, repositories: &[RepositorySummary]) -> String {
    let mut rendered = format!("Repositories for {owner}:\n");
    for repository in repositories {
        let description = repository
            .description
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or("No description");
        let _ = write!(
            rendered,
            "- {}\n  Description: {}\n  URL: {}\n  Stars: {}\n  Forks: {}\n  Last updated: {}\n\n",
            repository.name,
            description,
            repository.html_url,
            repository.stargazers_count,
            repository.forks_count,
            repository.updated_at.as_deref().unwrap_or("unknown"),
        );
    }
    rendered
}
