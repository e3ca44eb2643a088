use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use gitpilot_agent_core::{Agent, AgentConfig, AgentTool};
use gitpilot_ai::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, GitpilotAiError, LlmClient, Message,
};
use gitpilot_fetch::{ContentFetcher, FetchConfig};
use gitpilot_github::{GithubClient, GithubClientConfig};
use gitpilot_tools::{
    gitpilot_tool_names, register_gitpilot_tools, FetchUrlContentTool, GithubListFilesTool,
    GithubRenameFileTool, GitpilotToolkit,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::sync::Mutex;

struct ScriptedClient {
    responses: Mutex<VecDeque<Message>>,
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, GitpilotAiError> {
        let message = self.responses.lock().await.pop_front().ok_or_else(|| {
            GitpilotAiError::InvalidResponse("no scripted response left".to_string())
        })?;
        Ok(ChatResponse {
            message,
            finish_reason: Some("stop".to_string()),
            usage: ChatUsage::default(),
        })
    }
}

fn toolkit(server: &MockServer) -> GitpilotToolkit {
    let github = GithubClient::new(GithubClientConfig {
        api_base: server.base_url(),
        token: "test-token".to_string(),
        ..GithubClientConfig::default()
    })
    .expect("github client");
    let fetcher = ContentFetcher::new(FetchConfig {
        timeout_ms: 1_000,
        ..FetchConfig::default()
    })
    .expect("fetcher");
    GitpilotToolkit::new(github, fetcher)
}

fn parse_tool_message(message: &Message) -> Value {
    serde_json::from_str(&message.text_content()).expect("tool message is json")
}

#[test]
fn unit_registration_installs_every_named_tool() {
    let server = MockServer::start();
    let client = Arc::new(ScriptedClient {
        responses: Mutex::new(VecDeque::new()),
    });
    let mut agent = Agent::new(client, AgentConfig::default());
    register_gitpilot_tools(&mut agent, &toolkit(&server));

    let mut expected = gitpilot_tool_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    expected.sort();
    assert_eq!(agent.registered_tool_names(), expected);
}

#[tokio::test]
async fn integration_agent_turn_reads_file_through_tool_envelope() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/demo/contents/README.md")
            .query_param("ref", "main");
        then.status(200).json_body(json!({
            "path": "README.md",
            "sha": "sha-1",
            "content": STANDARD.encode("# Demo")
        }));
    });

    let client = Arc::new(ScriptedClient {
        responses: Mutex::new(VecDeque::from([
            Message::assistant_blocks(vec![ContentBlock::ToolCall {
                id: "call_1".to_string(),
                name: "github_get_file".to_string(),
                arguments: json!({ "owner": "octo", "repo": "demo", "path": "README.md" }),
            }]),
            Message::assistant_text("The README is a heading."),
        ])),
    });
    let mut agent = Agent::new(client, AgentConfig::default());
    register_gitpilot_tools(&mut agent, &toolkit(&server));

    let new_messages = agent.prompt("what is in the README?").await.expect("turn");

    let tool_result = parse_tool_message(&new_messages[2]);
    assert!(!new_messages[2].is_error);
    assert_eq!(
        tool_result,
        json!({ "ok": { "path": "README.md", "content": "# Demo", "sha": "sha-1" } })
    );
    assert_eq!(new_messages[3].text_content(), "The README is a heading.");
}

#[tokio::test]
async fn regression_remote_failure_becomes_error_envelope() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/octo/missing/git/trees/main");
        then.status(404).json_body(json!({ "message": "Not Found" }));
    });

    let tool = GithubListFilesTool::new(toolkit(&server).github);
    let result = tool
        .execute(json!({ "owner": "octo", "repo": "missing" }))
        .await;

    assert!(result.is_error);
    assert_eq!(result.content["error"]["kind"], "remote_api");
    assert!(result.content["error"]["message"]
        .as_str()
        .expect("message")
        .contains("status 404"));
}

#[tokio::test]
async fn functional_rename_tool_reports_success_sentence() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/octo/demo/git/ref/heads/main");
        then.status(200).json_body(json!({ "object": { "sha": "head" } }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/repos/octo/demo/git/trees/head");
        then.status(200).json_body(json!({
            "tree": [{ "path": "old.md", "mode": "100644", "type": "blob", "sha": "b1" }]
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/repos/octo/demo/git/trees");
        then.status(201).json_body(json!({ "sha": "tree-2" }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/repos/octo/demo/git/commits");
        then.status(201).json_body(json!({ "sha": "commit-2" }));
    });
    server.mock(|when, then| {
        when.method(PATCH).path("/repos/octo/demo/git/refs/heads/main");
        then.status(200).json_body(json!({ "object": { "sha": "commit-2" } }));
    });

    let tool = GithubRenameFileTool::new(toolkit(&server).github);
    let result = tool
        .execute(json!({
            "owner": "octo",
            "repo": "demo",
            "old_path": "old.md",
            "new_path": "new.md"
        }))
        .await;

    assert!(!result.is_error);
    assert_eq!(
        result.content,
        json!({ "ok": "Successfully renamed file from old.md to new.md" })
    );
}

#[tokio::test]
async fn regression_fetch_failure_is_reported_with_url() {
    let server = MockServer::start();
    let tool = FetchUrlContentTool::new(toolkit(&server).fetcher);
    let url = "http://127.0.0.1:9/nothing-listens-here";

    let result = tool.execute(json!({ "url": url })).await;

    assert!(result.is_error);
    assert_eq!(result.content["error"]["kind"], "network");
    assert!(result.content["error"]["message"]
        .as_str()
        .expect("message")
        .starts_with(&format!("Failed to retrieve content from {url}. Error:")));
}

#[tokio::test]
async fn functional_fetch_tool_defaults_to_text_mode() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/page");
        then.status(200)
            .body("<html><body><p>Hello <b>world</b></p></body></html>");
    });

    let tool = FetchUrlContentTool::new(toolkit(&server).fetcher);
    let result = tool
        .execute(json!({ "url": server.url("/page"), "max_length": 5 }))
        .await;

    assert_eq!(result.content, json!({ "ok": "Hello" }));
}
