//! Tool registry and the function-calling turn loop used to answer chat prompts.
use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use gitpilot_ai::{
    ChatRequest, ChatUsage, GitpilotAiError, LlmClient, Message, ToolCall, ToolChoice,
    ToolDefinition,
};
use serde_json::Value;
use thiserror::Error;

mod tool_bridge;

use tool_bridge::execute_tool_call_inner;

/// Settings for one [`Agent`].
///
/// # Examples
///
/// ```
/// use gitpilot_agent_core::AgentConfig;
///
/// let config = AgentConfig {
///     max_turns: 4,
///     ..AgentConfig::default()
/// };
///
/// assert_eq!(config.max_turns, 4);
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub system_prompt: String,
    pub max_turns: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_timeout_ms: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            max_turns: 8,
            temperature: None,
            max_tokens: None,
            tool_timeout_ms: Some(120_000),
        }
    }
}

/// Payload returned by a tool, serialized into the tool message the model sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub content: Value,
    pub is_error: bool,
}

impl ToolExecutionResult {
    pub fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    /// Converts the payload to text for insertion into a tool message.
    pub fn as_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// A callable function exposed to the model.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, arguments: Value) -> ToolExecutionResult;
}

#[derive(Debug, Clone)]
pub enum AgentEvent {
    AgentStart,
    AgentEnd {
        new_messages: usize,
    },
    TurnStart {
        turn: usize,
    },
    TurnEnd {
        turn: usize,
        tool_results: usize,
        request_duration_ms: u64,
        usage: ChatUsage,
        finish_reason: Option<String>,
    },
    MessageAdded {
        message: Message,
    },
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        tool_name: String,
        result: ToolExecutionResult,
        duration_ms: u64,
    },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Ai(#[from] GitpilotAiError),
    #[error("agent exceeded max turns ({0})")]
    MaxTurnsExceeded(usize),
}

type EventHandler = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    tool: Arc<dyn AgentTool>,
}

/// Runs prompts against an [`LlmClient`], dispatching requested tool calls one at a time.
pub struct Agent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
    messages: Vec<Message>,
    tools: HashMap<String, RegisteredTool>,
    handlers: Vec<EventHandler>,
}

impl Agent {
    /// Creates a new [`Agent`] with an initial system message when configured.
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        let mut messages = Vec::new();
        if !config.system_prompt.trim().is_empty() {
            messages.push(Message::system(config.system_prompt.clone()));
        }

        Self {
            client,
            config,
            messages,
            tools: HashMap::new(),
            handlers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Registers a tool under its definition name, replacing any previous tool of that name.
    pub fn register_tool<T>(&mut self, tool: T)
    where
        T: AgentTool + 'static,
    {
        let definition = tool.definition();
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                tool: Arc::new(tool),
            },
        );
    }

    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }

    /// Returns sorted registered tool names.
    pub fn registered_tool_names(&self) -> Vec<String> {
        let mut names = self.tools.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replaces the current conversation history with the provided messages.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a user prompt and advances the agent until the model stops calling tools.
    ///
    /// Returns every message added during the call, starting with the user prompt.
    pub async fn prompt(&mut self, text: impl Into<String>) -> Result<Vec<Message>, AgentError> {
        let start_index = self.messages.len();
        let user_message = Message::user(text);
        self.messages.push(user_message.clone());
        self.emit(AgentEvent::MessageAdded {
            message: user_message,
        });
        self.run_loop(start_index).await
    }

    fn emit(&self, event: AgentEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self
            .tools
            .values()
            .map(|registered| registered.definition.clone())
            .collect::<Vec<_>>();
        definitions.sort_by(|left, right| left.name.cmp(&right.name));
        definitions
    }

    async fn run_loop(&mut self, start_index: usize) -> Result<Vec<Message>, AgentError> {
        self.emit(AgentEvent::AgentStart);

        for turn in 1..=self.config.max_turns {
            self.emit(AgentEvent::TurnStart { turn });

            let tools = self.tool_definitions();
            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: self.messages.clone(),
                tool_choice: if tools.is_empty() {
                    None
                } else {
                    Some(ToolChoice::Auto)
                },
                tools,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            let request_started = std::time::Instant::now();
            let response = self.client.complete(request).await?;
            let request_duration_ms = request_started.elapsed().as_millis() as u64;
            let finish_reason = response.finish_reason.clone();
            let usage = response.usage.clone();
            let assistant = response.message;
            self.messages.push(assistant.clone());
            self.emit(AgentEvent::MessageAdded {
                message: assistant.clone(),
            });

            let tool_calls = assistant.tool_calls();
            if tool_calls.is_empty() {
                self.emit(AgentEvent::TurnEnd {
                    turn,
                    tool_results: 0,
                    request_duration_ms,
                    usage,
                    finish_reason,
                });
                let new_messages = self.messages[start_index..].to_vec();
                self.emit(AgentEvent::AgentEnd {
                    new_messages: new_messages.len(),
                });
                return Ok(new_messages);
            }

            let tool_results = tool_calls.len();
            for call in tool_calls {
                self.execute_tool_call(call).await;
            }

            self.emit(AgentEvent::TurnEnd {
                turn,
                tool_results,
                request_duration_ms,
                usage,
                finish_reason,
            });
        }

        Err(AgentError::MaxTurnsExceeded(self.config.max_turns))
    }

    async fn execute_tool_call(&mut self, call: ToolCall) {
        self.emit(AgentEvent::ToolExecutionStart {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let registered = self
            .tools
            .get(&call.name)
            .map(|tool| (tool.definition.clone(), Arc::clone(&tool.tool)));
        let tool_timeout = self
            .config
            .tool_timeout_ms
            .filter(|timeout_ms| *timeout_ms > 0)
            .map(Duration::from_millis);
        let started = std::time::Instant::now();
        let result = execute_tool_call_inner(call.clone(), registered, tool_timeout).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if result.is_error {
            tracing::warn!(tool = %call.name, duration_ms, "tool call failed");
        } else {
            tracing::info!(tool = %call.name, duration_ms, "tool call finished");
        }
        self.emit(AgentEvent::ToolExecutionEnd {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: result.clone(),
            duration_ms,
        });

        let tool_message =
            Message::tool_result(call.id, call.name, result.as_text(), result.is_error);
        self.messages.push(tool_message.clone());
        self.emit(AgentEvent::MessageAdded {
            message: tool_message,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use gitpilot_ai::{
        ChatRequest, ChatResponse, ChatUsage, ContentBlock, GitpilotAiError, LlmClient, Message,
        MessageRole, ToolChoice, ToolDefinition,
    };
    use serde_json::{json, Value};
    use tokio::sync::Mutex as AsyncMutex;

    use super::{Agent, AgentConfig, AgentError, AgentEvent, AgentTool, ToolExecutionResult};

    struct ScriptedClient {
        responses: AsyncMutex<VecDeque<ChatResponse>>,
        requests: AsyncMutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Message>) -> Arc<Self> {
            Arc::new(Self {
                responses: AsyncMutex::new(
                    responses
                        .into_iter()
                        .map(|message| ChatResponse {
                            message,
                            finish_reason: Some("stop".to_string()),
                            usage: ChatUsage::default(),
                        })
                        .collect(),
                ),
                requests: AsyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, GitpilotAiError> {
            self.requests.lock().await.push(request);
            self.responses.lock().await.pop_front().ok_or_else(|| {
                GitpilotAiError::InvalidResponse("scripted client exhausted".to_string())
            })
        }
    }

    struct ReadTool;

    #[async_trait]
    impl AgentTool for ReadTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "read".to_string(),
                description: "Read a file".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": { "path": { "type": "string" } },
                    "required": ["path"]
                }),
            }
        }

        async fn execute(&self, arguments: Value) -> ToolExecutionResult {
            let path = arguments["path"].as_str().unwrap_or_default();
            ToolExecutionResult::ok(json!({ "ok": format!("contents of {path}") }))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl AgentTool for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".to_string(),
                description: "Never finishes in time".to_string(),
                parameters: json!({ "type": "object" }),
            }
        }

        async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ToolExecutionResult::ok(json!("late"))
        }
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> Message {
        Message::assistant_blocks(vec![ContentBlock::ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }])
    }

    #[test]
    fn unit_tool_execution_result_as_text_keeps_strings_raw() {
        assert_eq!(ToolExecutionResult::ok(json!("plain")).as_text(), "plain");
        assert_eq!(
            ToolExecutionResult::error(json!({ "error": "boom" })).as_text(),
            "{\"error\":\"boom\"}"
        );
    }

    #[test]
    fn unit_new_agent_seeds_system_prompt_only_when_non_empty() {
        let client = ScriptedClient::new(vec![]);
        let agent = Agent::new(client.clone(), AgentConfig::default());
        assert_eq!(agent.messages().len(), 1);
        assert_eq!(agent.messages()[0].role, MessageRole::System);

        let agent = Agent::new(
            client,
            AgentConfig {
                system_prompt: "   ".to_string(),
                ..AgentConfig::default()
            },
        );
        assert!(agent.messages().is_empty());
    }

    #[tokio::test]
    async fn functional_prompt_without_tools_completes_in_one_turn() {
        let client = ScriptedClient::new(vec![Message::assistant_text("Hello from model")]);
        let mut agent = Agent::new(client.clone(), AgentConfig::default());

        let new_messages = agent.prompt("hi").await.expect("prompt should succeed");

        assert_eq!(new_messages.len(), 2);
        assert_eq!(new_messages[0].role, MessageRole::User);
        assert_eq!(new_messages[1].text_content(), "Hello from model");
        let requests = client.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tool_choice.is_none());
    }

    #[tokio::test]
    async fn functional_tool_turn_feeds_result_back_to_model() {
        let client = ScriptedClient::new(vec![
            tool_call("call_1", "read", json!({ "path": "README.md" })),
            Message::assistant_text("done"),
        ]);
        let mut agent = Agent::new(client.clone(), AgentConfig::default());
        agent.register_tool(ReadTool);

        let new_messages = agent.prompt("read it").await.expect("prompt should succeed");

        assert_eq!(new_messages.len(), 4);
        assert_eq!(new_messages[2].role, MessageRole::Tool);
        assert_eq!(new_messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(new_messages[2].text_content().contains("contents of README.md"));
        assert_eq!(new_messages[3].text_content(), "done");

        let requests = client.requests.lock().await;
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(requests[0].tools[0].name, "read");
        assert_eq!(requests[1].messages.last().map(|m| m.role), Some(MessageRole::Tool));
    }

    #[tokio::test]
    async fn regression_unknown_tool_is_reported_to_model_not_raised() {
        let client = ScriptedClient::new(vec![
            tool_call("call_1", "missing", json!({})),
            Message::assistant_text("sorry"),
        ]);
        let mut agent = Agent::new(client, AgentConfig::default());

        let new_messages = agent.prompt("go").await.expect("prompt should succeed");

        let tool_message = &new_messages[2];
        assert!(tool_message.is_error);
        assert!(tool_message
            .text_content()
            .contains("Tool 'missing' is not registered"));
    }

    #[tokio::test]
    async fn regression_schema_violation_skips_tool_execution() {
        let client = ScriptedClient::new(vec![
            tool_call("call_1", "read", json!({ "file": "README.md" })),
            Message::assistant_text("retrying"),
        ]);
        let mut agent = Agent::new(client, AgentConfig::default());
        agent.register_tool(ReadTool);

        let new_messages = agent.prompt("go").await.expect("prompt should succeed");

        let tool_message = &new_messages[2];
        assert!(tool_message.is_error);
        assert!(tool_message.text_content().contains("invalid_argument"));
        assert!(!tool_message.text_content().contains("contents of"));
    }

    #[tokio::test]
    async fn regression_tool_timeout_becomes_error_result() {
        let client = ScriptedClient::new(vec![
            tool_call("call_1", "slow", json!({})),
            Message::assistant_text("gave up"),
        ]);
        let mut agent = Agent::new(
            client,
            AgentConfig {
                tool_timeout_ms: Some(20),
                ..AgentConfig::default()
            },
        );
        agent.register_tool(SlowTool);

        let new_messages = agent.prompt("go").await.expect("prompt should succeed");
        assert!(new_messages[2].is_error);
        assert!(new_messages[2].text_content().contains("timed out"));
    }

    #[tokio::test]
    async fn regression_max_turns_exceeded_when_model_keeps_calling_tools() {
        let client = ScriptedClient::new(vec![
            tool_call("call_1", "read", json!({ "path": "a" })),
            tool_call("call_2", "read", json!({ "path": "b" })),
        ]);
        let mut agent = Agent::new(
            client,
            AgentConfig {
                max_turns: 2,
                ..AgentConfig::default()
            },
        );
        agent.register_tool(ReadTool);

        let error = agent.prompt("loop").await.expect_err("must stop");
        assert!(matches!(error, AgentError::MaxTurnsExceeded(2)));
    }

    #[tokio::test]
    async fn functional_multiple_tool_calls_run_in_request_order() {
        let client = ScriptedClient::new(vec![
            Message::assistant_blocks(vec![
                ContentBlock::ToolCall {
                    id: "call_a".to_string(),
                    name: "read".to_string(),
                    arguments: json!({ "path": "a" }),
                },
                ContentBlock::ToolCall {
                    id: "call_b".to_string(),
                    name: "read".to_string(),
                    arguments: json!({ "path": "b" }),
                },
            ]),
            Message::assistant_text("both read"),
        ]);
        let mut agent = Agent::new(client, AgentConfig::default());
        agent.register_tool(ReadTool);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        agent.subscribe(move |event| {
            if let AgentEvent::ToolExecutionStart { tool_call_id, .. } = event {
                sink.lock().expect("event lock").push(tool_call_id.clone());
            }
        });

        let new_messages = agent.prompt("read both").await.expect("prompt should succeed");

        assert_eq!(new_messages.len(), 5);
        assert_eq!(new_messages[2].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(new_messages[3].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(
            *events.lock().expect("event lock"),
            vec!["call_a".to_string(), "call_b".to_string()]
        );
    }

    #[tokio::test]
    async fn functional_replaced_history_is_sent_before_new_prompt() {
        let client = ScriptedClient::new(vec![Message::assistant_text("second answer")]);
        let mut agent = Agent::new(client.clone(), AgentConfig::default());
        let system = agent.messages()[0].clone();
        agent.replace_messages(vec![
            system,
            Message::user("first"),
            Message::assistant_text("first answer"),
        ]);

        agent.prompt("second").await.expect("prompt should succeed");

        let requests = client.requests.lock().await;
        let roles = requests[0]
            .messages
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
    }
}
