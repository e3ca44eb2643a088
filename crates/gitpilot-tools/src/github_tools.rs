use std::sync::Arc;

use async_trait::async_trait;
use gitpilot_agent_core::{AgentTool, ToolExecutionResult};
use gitpilot_ai::ToolDefinition;
use gitpilot_github::{render_repository_listing, GithubClient, DEFAULT_SUMMARY_ARTIFACT};
use serde_json::{json, Value};

use crate::{
    args::{
        branch_arg, optional_string, optional_usize, repo_arg, repo_schema,
        required_non_empty_string, required_string,
    },
    envelope::{finish, ToolFailure},
};

macro_rules! github_tool_structs {
    ($($tool:ident),+ $(,)?) => {
        $(
            pub struct $tool {
                client: Arc<GithubClient>,
            }

            impl $tool {
                pub fn new(client: Arc<GithubClient>) -> Self {
                    Self { client }
                }
            }
        )+
    };
}

github_tool_structs!(
    GithubGetFileTool,
    GithubCreateOrUpdateFileTool,
    GithubCreateDirectoryTool,
    GithubListFilesTool,
    GithubRenameFileTool,
    GithubRenameDirectoryTool,
    GithubDeleteFileTool,
    GithubListRepositoriesTool,
    GithubGetReadmeTool,
    GithubUpdateReadmeTool,
    GithubCreateReadmeTool,
    GithubGetActionsResultsTool,
    GithubCreateOrUpdateWorkflowTool,
    GithubListWorkflowRunsTool,
);

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, ToolFailure> {
    serde_json::to_value(value).map_err(|error| ToolFailure {
        kind: "remote_api",
        message: format!("failed to encode result: {error}"),
    })
}

#[async_trait]
impl AgentTool for GithubGetFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_get_file".to_string(),
            description: "Read a file from a GitHub repository. Returns its decoded text and the blob sha."
                .to_string(),
            parameters: repo_schema(
                json!({ "path": { "type": "string", "description": "File path inside the repository" } }),
                &["path"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let path = required_non_empty_string(&arguments, "path")?;
            let branch = branch_arg(&arguments)?;
            let file = self.client.get_file(&repo, &path, &branch).await?;
            to_payload(&file)
        }
        .await;
        finish("github_get_file", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubCreateOrUpdateFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_create_or_update_file".to_string(),
            description: "Create a file, or overwrite it if it already exists, with a single commit."
                .to_string(),
            parameters: repo_schema(
                json!({
                    "path": { "type": "string", "description": "File path inside the repository" },
                    "content": { "type": "string", "description": "Full new file content" },
                    "message": { "type": "string", "description": "Commit message" }
                }),
                &["path", "content", "message"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let path = required_non_empty_string(&arguments, "path")?;
            let content = required_string(&arguments, "content")?;
            let message = required_non_empty_string(&arguments, "message")?;
            let branch = branch_arg(&arguments)?;
            let commit = self
                .client
                .create_or_update_file(&repo, &path, &content, &message, &branch)
                .await?;
            to_payload(&commit)
        }
        .await;
        finish("github_create_or_update_file", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubCreateDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_create_directory".to_string(),
            description: "Create a directory by committing an empty .gitkeep file inside it."
                .to_string(),
            parameters: repo_schema(
                json!({ "path": { "type": "string", "description": "Directory path to create" } }),
                &["path"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let path = required_non_empty_string(&arguments, "path")?;
            let branch = branch_arg(&arguments)?;
            let commit = self.client.create_directory(&repo, &path, &branch).await?;
            to_payload(&commit)
        }
        .await;
        finish("github_create_directory", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubListFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_list_files".to_string(),
            description: "List every file path in the repository, optionally only those starting with a path prefix."
                .to_string(),
            parameters: repo_schema(
                json!({ "path": { "type": "string", "description": "Optional path prefix filter" } }),
                &[],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let prefix = optional_string(&arguments, "path")?.unwrap_or_default();
            let branch = branch_arg(&arguments)?;
            let files = self.client.list_files(&repo, &prefix, &branch).await?;
            Ok::<_, ToolFailure>(json!(files))
        }
        .await;
        finish("github_list_files", outcome)
    }
}

fn rename_schema(subject: &str) -> Value {
    repo_schema(
        json!({
            "old_path": { "type": "string", "description": format!("Current {subject} path") },
            "new_path": { "type": "string", "description": format!("New {subject} path") },
            "message": { "type": "string", "description": "Optional commit message" }
        }),
        &["old_path", "new_path"],
        true,
    )
}

#[async_trait]
impl AgentTool for GithubRenameFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_rename_file".to_string(),
            description: "Move or rename one file in a single commit.".to_string(),
            parameters: rename_schema("file"),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let old_path = required_non_empty_string(&arguments, "old_path")?;
            let new_path = required_non_empty_string(&arguments, "new_path")?;
            let message = optional_string(&arguments, "message")?;
            let branch = branch_arg(&arguments)?;
            self.client
                .rename_file(&repo, &old_path, &new_path, message.as_deref(), &branch)
                .await?;
            Ok::<_, ToolFailure>(json!(format!(
                "Successfully renamed file from {old_path} to {new_path}"
            )))
        }
        .await;
        finish("github_rename_file", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubRenameDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_rename_directory".to_string(),
            description: "Move or rename a directory and everything under it in a single commit."
                .to_string(),
            parameters: rename_schema("directory"),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let old_path = required_non_empty_string(&arguments, "old_path")?;
            let new_path = required_non_empty_string(&arguments, "new_path")?;
            let message = optional_string(&arguments, "message")?;
            let branch = branch_arg(&arguments)?;
            let renamed = self
                .client
                .rename_directory(&repo, &old_path, &new_path, message.as_deref(), &branch)
                .await?;
            Ok::<_, ToolFailure>(json!(format!(
                "Successfully renamed directory from {} to {} ({} files moved)",
                old_path.trim_end_matches('/'),
                new_path.trim_end_matches('/'),
                renamed.moved
            )))
        }
        .await;
        finish("github_rename_directory", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubDeleteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_delete_file".to_string(),
            description: "Delete one file. Its current sha is looked up right before deleting."
                .to_string(),
            parameters: repo_schema(
                json!({
                    "path": { "type": "string", "description": "File path to delete" },
                    "message": { "type": "string", "description": "Commit message" }
                }),
                &["path", "message"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let path = required_non_empty_string(&arguments, "path")?;
            let message = required_non_empty_string(&arguments, "message")?;
            let branch = branch_arg(&arguments)?;
            let commit_sha = self
                .client
                .delete_file_fresh(&repo, &path, &message, &branch)
                .await?;
            Ok::<_, ToolFailure>(json!({ "path": path, "commit_sha": commit_sha }))
        }
        .await;
        finish("github_delete_file", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubListRepositoriesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_list_repositories".to_string(),
            description: "List a user's or organization's repositories, most recently updated first."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "owner": { "type": "string", "description": "User or organization" },
                    "per_page": { "type": "integer", "minimum": 1, "maximum": 100 }
                },
                "required": ["owner"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let owner = required_non_empty_string(&arguments, "owner")?;
            let per_page = optional_usize(&arguments, "per_page", 100)?.unwrap_or(100);
            let repositories = self
                .client
                .list_repositories(&owner, per_page as u32)
                .await?;
            Ok::<_, ToolFailure>(json!(render_repository_listing(&owner, &repositories)))
        }
        .await;
        finish("github_list_repositories", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubGetReadmeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_get_readme".to_string(),
            description: "Read the repository README, whatever its file name.".to_string(),
            parameters: repo_schema(json!({}), &[], true),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let branch = branch_arg(&arguments)?;
            let readme = self.client.get_readme(&repo, &branch).await?;
            to_payload(&readme)
        }
        .await;
        finish("github_get_readme", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubUpdateReadmeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_update_readme".to_string(),
            description: "Replace the content of the existing README.".to_string(),
            parameters: repo_schema(
                json!({
                    "content": { "type": "string", "description": "Full new README content" },
                    "message": { "type": "string", "description": "Commit message" }
                }),
                &["content", "message"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let content = required_string(&arguments, "content")?;
            let message = required_non_empty_string(&arguments, "message")?;
            let branch = branch_arg(&arguments)?;
            let commit = self
                .client
                .update_readme(&repo, &content, &message, &branch)
                .await?;
            to_payload(&commit)
        }
        .await;
        finish("github_update_readme", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubCreateReadmeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_create_readme".to_string(),
            description: "Create README.md at the repository root.".to_string(),
            parameters: repo_schema(
                json!({ "content": { "type": "string", "description": "README content" } }),
                &["content"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let content = required_string(&arguments, "content")?;
            let branch = branch_arg(&arguments)?;
            let commit = self.client.create_readme(&repo, &content, &branch).await?;
            to_payload(&commit)
        }
        .await;
        finish("github_create_readme", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubGetActionsResultsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_get_actions_results".to_string(),
            description: "Download a workflow artifact and return the summary.md it contains."
                .to_string(),
            parameters: repo_schema(
                json!({
                    "artifact_name": {
                        "type": "string",
                        "description": "Artifact name, defaults to SummaryResult"
                    }
                }),
                &[],
                false,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let artifact_name = optional_string(&arguments, "artifact_name")?
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUMMARY_ARTIFACT.to_string());
            let summary = self
                .client
                .get_actions_results(&repo, &artifact_name)
                .await?;
            Ok::<_, ToolFailure>(json!(summary))
        }
        .await;
        finish("github_get_actions_results", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubCreateOrUpdateWorkflowTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_create_or_update_workflow".to_string(),
            description: "Create or replace a GitHub Actions workflow file under .github/workflows."
                .to_string(),
            parameters: repo_schema(
                json!({
                    "workflow_name": { "type": "string", "description": "Workflow file name, e.g. ci.yml" },
                    "content": { "type": "string", "description": "Workflow YAML" }
                }),
                &["workflow_name", "content"],
                true,
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let workflow_name = required_non_empty_string(&arguments, "workflow_name")?;
            let content = required_string(&arguments, "content")?;
            let branch = branch_arg(&arguments)?;
            let commit = self
                .client
                .create_or_update_workflow(&repo, &workflow_name, &content, &branch)
                .await?;
            to_payload(&commit)
        }
        .await;
        finish("github_create_or_update_workflow", outcome)
    }
}

#[async_trait]
impl AgentTool for GithubListWorkflowRunsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "github_list_workflow_runs".to_string(),
            description: "List recent GitHub Actions workflow runs with status and conclusion."
                .to_string(),
            parameters: repo_schema(json!({}), &[], false),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let outcome = async {
            let repo = repo_arg(&arguments)?;
            let runs = self.client.list_workflow_runs(&repo).await?;
            to_payload(&runs)
        }
        .await;
        finish("github_list_workflow_runs", outcome)
    }
}
