//! Uniform `{"ok": ...}` / `{"error": {"kind", "message"}}` tool results.

use gitpilot_agent_core::ToolExecutionResult;
use gitpilot_fetch::FetchError;
use gitpilot_github::GithubError;
use serde_json::{json, Value};

/// A failed tool call, reported back to the model instead of aborting the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub kind: &'static str,
    pub message: String,
}

impl ToolFailure {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            kind: "invalid_argument",
            message: message.into(),
        }
    }

    pub fn fetch(url: &str, error: &FetchError) -> Self {
        Self {
            kind: error.kind(),
            message: error.render_for_url(url),
        }
    }
}

impl From<GithubError> for ToolFailure {
    fn from(error: GithubError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub fn tool_ok(payload: Value) -> ToolExecutionResult {
    ToolExecutionResult::ok(json!({ "ok": payload }))
}

pub fn tool_error(failure: &ToolFailure) -> ToolExecutionResult {
    ToolExecutionResult::error(json!({
        "error": {
            "kind": failure.kind,
            "message": failure.message,
        }
    }))
}

pub(crate) fn finish(tool_name: &str, outcome: Result<Value, ToolFailure>) -> ToolExecutionResult {
    match outcome {
        Ok(payload) => tool_ok(payload),
        Err(failure) => {
            tracing::warn!(tool = tool_name, kind = failure.kind, message = %failure.message, "tool returned error envelope");
            tool_error(&failure)
        }
    }
}
