//! GitHub REST operations used by the gitpilot tools: repository contents, git tree
//! renames, repository listings, README management and Actions artifacts.

mod actions;
mod client;
mod error;
mod files;
mod readme;
mod repositories;
mod transport;
mod tree;

pub use actions::{
    read_summary_from_archive, WorkflowRunSummary, DEFAULT_SUMMARY_ARTIFACT, SUMMARY_FILE_NAME,
};
pub use client::{GithubClient, GithubClientConfig, RepoRef, DEFAULT_GITHUB_API_BASE};
pub use error::GithubError;
pub use files::{FileCommit, RenameOutcome, RepoFile};
pub use repositories::{render_repository_listing, RepositorySummary};
pub use tree::{plan_directory_rename, plan_file_rename, RenamePlan, TreeEntry};
