//! Chat-completion types and the OpenAI/Azure OpenAI client used by gitpilot.
mod openai;
mod retry;
mod types;

pub use openai::{azure_deployment_api_base, OpenAiAuthScheme, OpenAiClient, OpenAiConfig};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, GitpilotAiError, LlmClient, Message,
    MessageRole, ToolCall, ToolChoice, ToolDefinition,
};
