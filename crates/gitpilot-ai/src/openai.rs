use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    retry::{
        is_retryable_http_error, new_request_id, parse_retry_after_ms, retry_delay_ms,
        should_retry_status,
    },
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, GitpilotAiError, LlmClient, Message,
    MessageRole, ToolChoice, ToolDefinition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How the API key is presented to the service.
pub enum OpenAiAuthScheme {
    #[default]
    Bearer,
    /// Azure OpenAI `api-key` header.
    ApiKeyHeader,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub auth_scheme: OpenAiAuthScheme,
    pub api_version: Option<String>,
}

/// Builds the deployment-scoped base URL of an Azure OpenAI resource.
pub fn azure_deployment_api_base(endpoint: &str, deployment: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("/openai/deployments/") {
        return endpoint.to_string();
    }
    format!("{endpoint}/openai/deployments/{}", deployment.trim())
}

#[derive(Debug, Clone)]
/// Chat-completions client for OpenAI and Azure OpenAI deployments.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, GitpilotAiError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(GitpilotAiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let (name, value) = match config.auth_scheme {
            OpenAiAuthScheme::Bearer => (AUTHORIZATION.as_str(), format!("Bearer {api_key}")),
            OpenAiAuthScheme::ApiKeyHeader => ("api-key", api_key.to_string()),
        };
        let mut value = HeaderValue::from_str(&value).map_err(|error| {
            GitpilotAiError::InvalidResponse(format!("invalid API key header: {error}"))
        })?;
        value.set_sensitive(true);
        headers.insert(name, value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn chat_completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, GitpilotAiError> {
        let body = build_chat_request_body(&request)?;
        let url = self.chat_completions_url();
        let started = Instant::now();
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            let request_id = new_request_id();
            tracing::debug!(
                request_id = %request_id,
                attempt,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "sending chat completion request"
            );
            let mut builder = self
                .client
                .post(&url)
                .header("x-gitpilot-request-id", &request_id)
                .header("x-gitpilot-retry-attempt", attempt.to_string());
            if let Some(api_version) = self.config.api_version.as_deref() {
                builder = builder.query(&[("api-version", api_version)]);
            }

            match builder.json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let raw = response.text().await?;
                        let parsed = parse_chat_response(&raw)?;
                        tracing::debug!(
                            request_id = %request_id,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            total_tokens = parsed.usage.total_tokens,
                            "chat completion finished"
                        );
                        return Ok(parsed);
                    }

                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let raw = response.text().await?;
                    if attempt < max_retries && should_retry_status(status.as_u16()) {
                        let delay_ms = retry_delay_ms(attempt, retry_after_ms);
                        tracing::warn!(
                            status = status.as_u16(),
                            delay_ms,
                            "retrying chat completion after provider status"
                        );
                        sleep(Duration::from_millis(delay_ms)).await;
                        continue;
                    }

                    return Err(GitpilotAiError::HttpStatus {
                        status: status.as_u16(),
                        body: raw,
                    });
                }
                Err(error) => {
                    if attempt < max_retries && is_retryable_http_error(&error) {
                        let delay_ms = retry_delay_ms(attempt, None);
                        tracing::warn!(%error, delay_ms, "retrying chat completion after transport error");
                        sleep(Duration::from_millis(delay_ms)).await;
                        continue;
                    }
                    return Err(GitpilotAiError::Http(error));
                }
            }
        }

        Err(GitpilotAiError::InvalidResponse(
            "request retry loop terminated unexpectedly".to_string(),
        ))
    }
}

fn build_chat_request_body(request: &ChatRequest) -> Result<Value, GitpilotAiError> {
    let mut body = json!({
        "model": request.model,
        "messages": to_openai_messages(&request.messages)?,
    });

    if !request.tools.is_empty() {
        body["tools"] = to_openai_tools(&request.tools);
    }
    if let Some(tool_choice) = request.tool_choice.as_ref() {
        if !request.tools.is_empty() || matches!(tool_choice, ToolChoice::None) {
            body["tool_choice"] = to_openai_tool_choice(*tool_choice);
        }
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    Ok(body)
}

fn to_openai_tool_choice(tool_choice: ToolChoice) -> Value {
    match tool_choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
    }
}

fn to_openai_tools(tools: &[ToolDefinition]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect(),
    )
}

fn to_openai_messages(messages: &[Message]) -> Result<Vec<Value>, GitpilotAiError> {
    let mut serialized = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            MessageRole::System | MessageRole::User => serialized.push(json!({
                "role": message.role.as_str(),
                "content": message.text_content(),
            })),
            MessageRole::Assistant => {
                let tool_calls = message
                    .tool_calls()
                    .into_iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": stringify_tool_arguments(&call.arguments),
                            }
                        })
                    })
                    .collect::<Vec<_>>();

                let text = message.text_content();
                let content = if text.trim().is_empty() && !tool_calls.is_empty() {
                    Value::Null
                } else {
                    Value::String(text)
                };

                let mut entry = json!({
                    "role": "assistant",
                    "content": content,
                });
                if !tool_calls.is_empty() {
                    entry["tool_calls"] = Value::Array(tool_calls);
                }
                serialized.push(entry);
            }
            MessageRole::Tool => {
                let Some(tool_call_id) = message.tool_call_id.as_deref() else {
                    return Err(GitpilotAiError::InvalidResponse(
                        "tool message is missing tool_call_id".to_string(),
                    ));
                };
                let mut entry = json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": message.text_content(),
                });
                if let Some(name) = &message.tool_name {
                    entry["name"] = Value::String(name.clone());
                }
                serialized.push(entry);
            }
        }
    }

    Ok(serialized)
}

fn stringify_tool_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(value) => value.clone(),
        value => value.to_string(),
    }
}

fn parse_chat_response(raw: &str) -> Result<ChatResponse, GitpilotAiError> {
    let parsed: OpenAiChatResponse = serde_json::from_str(raw)?;
    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        GitpilotAiError::InvalidResponse("response contained no choices".to_string())
    })?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content.filter(|text| !text.trim().is_empty()) {
        content.push(ContentBlock::Text { text });
    }
    for tool_call in choice.message.tool_calls.unwrap_or_default() {
        if tool_call.call_type != "function" {
            continue;
        }
        // Models occasionally emit arguments that are not valid JSON; keep the raw text so
        // schema validation can report it back to the model.
        let arguments = serde_json::from_str::<Value>(&tool_call.function.arguments)
            .unwrap_or(Value::String(tool_call.function.arguments));
        content.push(ContentBlock::ToolCall {
            id: tool_call.id,
            name: tool_call.function.name,
            arguments,
        });
    }

    let usage = parsed
        .usage
        .map(|usage| ChatUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        message: Message::assistant_blocks(content),
        finish_reason: choice.finish_reason,
        usage,
    })
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}
