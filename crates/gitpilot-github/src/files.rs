use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    client::{GithubClient, RepoRef},
    transport::path_segments,
    tree::{plan_directory_rename, plan_file_rename, RenamePlan, TreeEntry},
    GithubError,
};

/// Decoded contents of a repository file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
    pub sha: String,
}

/// File and commit produced by a contents write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCommit {
    pub path: String,
    pub sha: String,
    pub commit_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub commit_sha: String,
    pub moved: usize,
}

#[derive(Debug, Deserialize)]
struct GitTreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ShaObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRefResponse {
    object: ShaObject,
}

#[derive(Debug, Deserialize)]
struct ContentsWriteResponse {
    content: Option<ContentsWriteFile>,
    commit: ShaObject,
}

#[derive(Debug, Deserialize)]
struct ContentsWriteFile {
    path: String,
    sha: String,
}

enum RenameKind {
    File,
    Directory,
}

impl RenameKind {
    fn label(&self) -> &'static str {
        match self {
            RenameKind::File => "file",
            RenameKind::Directory => "directory",
        }
    }

    fn plan(&self, entries: &[TreeEntry], old: &str, new: &str) -> Result<RenamePlan, GithubError> {
        match self {
            RenameKind::File => plan_file_rename(entries, old, new),
            RenameKind::Directory => plan_directory_rename(entries, old, new),
        }
    }
}

/// Builds a [`RepoFile`] from a contents or readme API payload.
pub(crate) fn decode_contents_payload(
    payload: &Value,
    fallback_path: &str,
) -> Result<RepoFile, GithubError> {
    let encoded = payload
        .get("content")
        .and_then(Value::as_str)
        .ok_or(GithubError::MissingField("content"))?;
    let sha = payload
        .get("sha")
        .and_then(Value::as_str)
        .ok_or(GithubError::MissingField("sha"))?;
    let path = payload
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or(fallback_path);

    let compact = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();
    let bytes = STANDARD.decode(compact).map_err(|error| GithubError::Decode {
        operation: "file content".to_string(),
        detail: error.to_string(),
    })?;
    let content = String::from_utf8(bytes).map_err(|error| GithubError::Decode {
        operation: "file content".to_string(),
        detail: error.to_string(),
    })?;

    Ok(RepoFile {
        path: path.to_string(),
        content,
        sha: sha.to_string(),
    })
}

fn ensure_complete_listing(listing: &GitTreeResponse) -> Result<(), GithubError> {
    if listing.truncated {
        return Err(GithubError::Conflict(
            "recursive tree listing is truncated; refusing to rewrite the tree".to_string(),
        ));
    }
    Ok(())
}

fn ensure_head_unchanged(branch: &str, expected: &str, current: &str) -> Result<(), GithubError> {
    if expected == current {
        return Ok(());
    }
    Err(GithubError::Conflict(format!(
        "branch {branch} moved from {expected} to {current} during the rename; the branch was not updated"
    )))
}

impl GithubClient {
    /// Reads and decodes one file at `branch`.
    pub async fn get_file(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<RepoFile, GithubError> {
        let url = self.repo_endpoint(repo, ["contents"].into_iter().chain(path_segments(path)))?;
        let payload: Value = self
            .request_json("get file", || {
                self.http.get(url.clone()).query(&[("ref", branch)])
            })
            .await?;
        decode_contents_payload(&payload, path)
    }

    /// Writes `content` to `path`, updating in place when the file already exists.
    ///
    /// The blob sha is read immediately before the write. Any failure of that read is
    /// treated as "file absent" and the write becomes a create.
    pub async fn create_or_update_file(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<FileCommit, GithubError> {
        let existing_sha = match self.get_file(repo, path, branch).await {
            Ok(existing) => Some(existing.sha),
            Err(error) => {
                tracing::debug!(repo = %repo.as_slug(), path, %error, "creating new file");
                None
            }
        };
        self.put_contents(repo, path, content, message, branch, existing_sha.as_deref())
            .await
    }

    pub(crate) async fn put_contents(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        sha: Option<&str>,
    ) -> Result<FileCommit, GithubError> {
        let url = self.repo_endpoint(repo, ["contents"].into_iter().chain(path_segments(path)))?;
        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = Value::String(sha.to_string());
        }

        let response: ContentsWriteResponse = self
            .request_json("put file", || self.http.put(url.clone()).json(&payload))
            .await?;
        let file = response.content.ok_or(GithubError::MissingField("content"))?;
        tracing::info!(repo = %repo.as_slug(), path = %file.path, created = sha.is_none(), "file written");
        Ok(FileCommit {
            path: file.path,
            sha: file.sha,
            commit_sha: response.commit.sha,
        })
    }

    /// Creates an empty `.gitkeep` inside `path` so the directory exists.
    pub async fn create_directory(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<FileCommit, GithubError> {
        let directory = path.trim_end_matches('/');
        if directory.is_empty() {
            return Err(GithubError::InvalidArgument(
                "directory path must not be empty".to_string(),
            ));
        }
        self.create_or_update_file(
            repo,
            &format!("{directory}/.gitkeep"),
            "",
            &format!("Create directory: {directory}"),
            branch,
        )
        .await
    }

    /// Lists blob paths at `branch`, keeping those that start with `prefix`.
    pub async fn list_files(
        &self,
        repo: &RepoRef,
        prefix: &str,
        branch: &str,
    ) -> Result<Vec<String>, GithubError> {
        let listing = self.recursive_tree(repo, branch).await?;
        if listing.truncated {
            tracing::warn!(repo = %repo.as_slug(), branch, "github truncated the recursive tree listing");
        }
        Ok(listing
            .tree
            .into_iter()
            .filter(TreeEntry::is_blob)
            .map(|entry| entry.path)
            .filter(|path| prefix.is_empty() || path.starts_with(prefix))
            .collect())
    }

    async fn recursive_tree(
        &self,
        repo: &RepoRef,
        tree_ish: &str,
    ) -> Result<GitTreeResponse, GithubError> {
        let url = self.repo_endpoint(
            repo,
            ["git", "trees"].into_iter().chain(path_segments(tree_ish)),
        )?;
        self.request_json("get tree", || {
            self.http.get(url.clone()).query(&[("recursive", "1")])
        })
        .await
    }

    async fn branch_head(&self, repo: &RepoRef, branch: &str) -> Result<String, GithubError> {
        let url = self.repo_endpoint(
            repo,
            ["git", "ref", "heads"].into_iter().chain(path_segments(branch)),
        )?;
        let response: GitRefResponse = self
            .request_json("get branch head", || self.http.get(url.clone()))
            .await?;
        Ok(response.object.sha)
    }

    pub async fn rename_file(
        &self,
        repo: &RepoRef,
        old_path: &str,
        new_path: &str,
        message: Option<&str>,
        branch: &str,
    ) -> Result<RenameOutcome, GithubError> {
        self.rename(RenameKind::File, repo, old_path, new_path, message, branch)
            .await
    }

    pub async fn rename_directory(
        &self,
        repo: &RepoRef,
        old_path: &str,
        new_path: &str,
        message: Option<&str>,
        branch: &str,
    ) -> Result<RenameOutcome, GithubError> {
        self.rename(
            RenameKind::Directory,
            repo,
            old_path.trim_end_matches('/'),
            new_path.trim_end_matches('/'),
            message,
            branch,
        )
        .await
    }

    /// Rewrites the tree of the branch head and fast-forwards the branch to a new commit.
    ///
    /// The head is read again right before the ref update; if another writer moved the
    /// branch in between, nothing is updated and [`GithubError::Conflict`] is returned.
    /// A truncated tree listing is refused before any write, since the new tree is posted
    /// without `base_tree` and would drop every unlisted path.
    async fn rename(
        &self,
        kind: RenameKind,
        repo: &RepoRef,
        old_path: &str,
        new_path: &str,
        message: Option<&str>,
        branch: &str,
    ) -> Result<RenameOutcome, GithubError> {
        let head = self.branch_head(repo, branch).await?;
        let listing = self.recursive_tree(repo, &head).await?;
        ensure_complete_listing(&listing)?;
        let plan = kind.plan(&listing.tree, old_path, new_path)?;

        let trees_url = self.repo_endpoint(repo, ["git", "trees"])?;
        let tree_payload = json!({ "tree": plan.entries });
        let new_tree: ShaObject = self
            .request_json("create tree", || {
                self.http.post(trees_url.clone()).json(&tree_payload)
            })
            .await?;

        let default_message = format!("Rename {} from {old_path} to {new_path}", kind.label());
        let commits_url = self.repo_endpoint(repo, ["git", "commits"])?;
        let commit_payload = json!({
            "message": message.unwrap_or(default_message.as_str()),
            "tree": new_tree.sha,
            "parents": [head],
        });
        let commit: ShaObject = self
            .request_json("create commit", || {
                self.http.post(commits_url.clone()).json(&commit_payload)
            })
            .await?;

        let current = self.branch_head(repo, branch).await?;
        if let Err(error) = ensure_head_unchanged(branch, &head, &current) {
            tracing::warn!(repo = %repo.as_slug(), branch, expected = %head, found = %current, "branch moved during rename");
            return Err(error);
        }

        let ref_url = self.repo_endpoint(
            repo,
            ["git", "refs", "heads"].into_iter().chain(path_segments(branch)),
        )?;
        let ref_payload = json!({ "sha": commit.sha, "force": false });
        let _: Value = self
            .request_json("update branch ref", || {
                self.http.patch(ref_url.clone()).json(&ref_payload)
            })
            .await?;

        tracing::info!(
            repo = %repo.as_slug(),
            kind = kind.label(),
            old_path,
            new_path,
            moved = plan.moved,
            "rename committed"
        );
        Ok(RenameOutcome {
            commit_sha: commit.sha,
            moved: plan.moved,
        })
    }

    /// Deletes `path` using the caller-supplied blob `sha`. Returns the commit sha.
    pub async fn delete_file(
        &self,
        repo: &RepoRef,
        path: &str,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> Result<String, GithubError> {
        let url = self.repo_endpoint(repo, ["contents"].into_iter().chain(path_segments(path)))?;
        let payload = json!({
            "message": message,
            "sha": sha,
            "branch": branch,
        });
        let response: ContentsWriteResponse = self
            .request_json("delete file", || self.http.delete(url.clone()).json(&payload))
            .await?;
        tracing::info!(repo = %repo.as_slug(), path, "file deleted");
        Ok(response.commit.sha)
    }

    /// Reads the current sha of `path` and deletes it.
    pub async fn delete_file_fresh(
        &self,
        repo: &RepoRef,
        path: &str,
        message: &str,
        branch: &str,
    ) -> Result<String, GithubError> {
        let existing = self.get_file(repo, path, branch).await?;
        self.delete_file(repo, path, message, &existing.sha, branch)
            .await
    }
}
