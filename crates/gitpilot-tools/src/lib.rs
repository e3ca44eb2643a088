//! The fixed toolset exposed to the model: GitHub repository operations and web fetches.

use std::sync::Arc;

use gitpilot_agent_core::Agent;
use gitpilot_fetch::ContentFetcher;
use gitpilot_github::GithubClient;

mod args;
mod envelope;
mod fetch_tools;
mod github_tools;

pub use envelope::{tool_error, tool_ok, ToolFailure};
pub use fetch_tools::{FetchImageUrlsTool, FetchUrlContentTool};
pub use github_tools::{
    GithubCreateDirectoryTool, GithubCreateOrUpdateFileTool, GithubCreateOrUpdateWorkflowTool,
    GithubCreateReadmeTool, GithubDeleteFileTool, GithubGetActionsResultsTool, GithubGetFileTool,
    GithubGetReadmeTool, GithubListFilesTool, GithubListRepositoriesTool,
    GithubListWorkflowRunsTool, GithubRenameDirectoryTool, GithubRenameFileTool,
    GithubUpdateReadmeTool,
};

const GITPILOT_TOOL_NAMES: [&str; 16] = [
    "github_get_file",
    "github_create_or_update_file",
    "github_create_directory",
    "github_list_files",
    "github_rename_file",
    "github_rename_directory",
    "github_delete_file",
    "github_list_repositories",
    "github_get_readme",
    "github_update_readme",
    "github_create_readme",
    "github_get_actions_results",
    "github_create_or_update_workflow",
    "github_list_workflow_runs",
    "fetch_url_content",
    "fetch_image_urls",
];

/// Shared clients the tools call through.
#[derive(Clone)]
pub struct GitpilotToolkit {
    pub github: Arc<GithubClient>,
    pub fetcher: Arc<ContentFetcher>,
}

impl GitpilotToolkit {
    pub fn new(github: GithubClient, fetcher: ContentFetcher) -> Self {
        Self {
            github: Arc::new(github),
            fetcher: Arc::new(fetcher),
        }
    }
}

/// Names of every tool [`register_gitpilot_tools`] installs.
pub fn gitpilot_tool_names() -> Vec<&'static str> {
    GITPILOT_TOOL_NAMES.to_vec()
}

pub fn register_gitpilot_tools(agent: &mut Agent, toolkit: &GitpilotToolkit) {
    let github = &toolkit.github;
    agent.register_tool(GithubGetFileTool::new(github.clone()));
    agent.register_tool(GithubCreateOrUpdateFileTool::new(github.clone()));
    agent.register_tool(GithubCreateDirectoryTool::new(github.clone()));
    agent.register_tool(GithubListFilesTool::new(github.clone()));
    agent.register_tool(GithubRenameFileTool::new(github.clone()));
    agent.register_tool(GithubRenameDirectoryTool::new(github.clone()));
    agent.register_tool(GithubDeleteFileTool::new(github.clone()));
    agent.register_tool(GithubListRepositoriesTool::new(github.clone()));
    agent.register_tool(GithubGetReadmeTool::new(github.clone()));
    agent.register_tool(GithubUpdateReadmeTool::new(github.clone()));
    agent.register_tool(GithubCreateReadmeTool::new(github.clone()));
    agent.register_tool(GithubGetActionsResultsTool::new(github.clone()));
    agent.register_tool(GithubCreateOrUpdateWorkflowTool::new(github.clone()));
    agent.register_tool(GithubListWorkflowRunsTool::new(github.clone()));
    agent.register_tool(FetchUrlContentTool::new(toolkit.fetcher.clone()));
    agent.register_tool(FetchImageUrlsTool::new(toolkit.fetcher.clone()));
}
