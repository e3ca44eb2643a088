use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gitpilot_agent_core::{Agent, AgentConfig};
use gitpilot_ai::{LlmClient, Message, MessageRole};
use serde_json::json;
use tokio::net::TcpListener;

use crate::conversation_store::ConversationStore;

mod static_assets;
mod types;

use static_assets::serve_static_file;
use types::{GatewayApiError, PromptRequest, PromptResponse};

pub const DEMOPROMPT_ENDPOINT: &str = "/demoprompt/{conversation_id}";
const ROOT_ENDPOINT: &str = "/";
const HEALTH_ENDPOINT: &str = "/health";
const STATIC_ENDPOINT: &str = "/static/{*path}";
const WELCOME_MESSAGE: &str = "Welcome to the API. Static files are served under /static";
const EMPTY_REPLY_FALLBACK: &str = "I couldn't generate a textual response for this request.";
const INPUT_BODY_SIZE_MULTIPLIER: usize = 8;

/// Installs the model-callable tools on each fresh per-request agent.
pub trait ChatToolRegistrar: Send + Sync {
    fn register(&self, agent: &mut Agent);
}

#[derive(Clone, Default)]
pub struct NoopChatToolRegistrar;

impl ChatToolRegistrar for NoopChatToolRegistrar {
    fn register(&self, _agent: &mut Agent) {}
}

#[derive(Clone)]
pub struct ChatToolRegistrarFn {
    inner: Arc<dyn Fn(&mut Agent) + Send + Sync>,
}

impl ChatToolRegistrarFn {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&mut Agent) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }
}

impl ChatToolRegistrar for ChatToolRegistrarFn {
    fn register(&self, agent: &mut Agent) {
        (self.inner)(agent);
    }
}

#[derive(Clone)]
pub struct GatewayServerConfig {
    pub client: Arc<dyn LlmClient>,
    pub model: String,
    pub system_prompt: String,
    pub max_turns: usize,
    pub tool_registrar: Arc<dyn ChatToolRegistrar>,
    /// Upper bound on one chat turn; `0` disables it.
    pub turn_timeout_ms: u64,
    pub bind: String,
    pub static_dir: PathBuf,
    pub max_input_chars: usize,
}

pub struct GatewayServerState {
    pub config: GatewayServerConfig,
    pub conversations: ConversationStore,
}

impl GatewayServerState {
    pub fn new(config: GatewayServerConfig) -> Self {
        Self {
            config,
            conversations: ConversationStore::new(),
        }
    }
}

/// Binds `config.bind` and serves until ctrl-c.
pub async fn run_gateway_server(config: GatewayServerConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gitpilot server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound server address")?;

    tracing::info!(
        addr = %local_addr,
        model = %config.model,
        static_dir = %config.static_dir.display(),
        "gitpilot server listening"
    );

    let state = Arc::new(GatewayServerState::new(config));
    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gitpilot server exited unexpectedly")?;

    tracing::info!("gitpilot server stopped");
    Ok(())
}

pub fn build_gateway_router(state: Arc<GatewayServerState>) -> Router {
    Router::new()
        .route(DEMOPROMPT_ENDPOINT, post(handle_demoprompt))
        .route(ROOT_ENDPOINT, get(handle_root))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(STATIC_ENDPOINT, get(handle_static))
        .fallback(handle_not_found)
        .layer(middleware::from_fn(apply_cors))
        .with_state(state)
}

async fn apply_cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    let any = HeaderValue::from_static("*");
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, any.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, any.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, any);
    response
}

async fn handle_root() -> Response {
    Json(json!({ "message": WELCOME_MESSAGE })).into_response()
}

async fn handle_health(State(state): State<Arc<GatewayServerState>>) -> Response {
    Json(json!({
        "status": "ok",
        "conversations": state.conversations.len(),
    }))
    .into_response()
}

async fn handle_static(
    State(state): State<Arc<GatewayServerState>>,
    Path(path): Path<String>,
) -> Response {
    serve_static_file(&state.config.static_dir, &path).await
}

async fn handle_not_found() -> Response {
    GatewayApiError::not_found("no route matches this request").into_response()
}

async fn handle_demoprompt(
    State(state): State<Arc<GatewayServerState>>,
    Path(conversation_id): Path<String>,
    body: Bytes,
) -> Response {
    let prompt = match parse_prompt_body(&state, &body) {
        Ok(prompt) => prompt,
        Err(error) => return error.into_response(),
    };
    match execute_chat_turn(&state, &conversation_id, &prompt).await {
        Ok(response) => (StatusCode::OK, Json(PromptResponse { response })).into_response(),
        Err(error) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                status = error.status.as_u16(),
                code = error.code,
                message = %error.message,
                "chat turn failed"
            );
            error.into_response()
        }
    }
}

fn parse_prompt_body(state: &GatewayServerState, body: &Bytes) -> Result<String, GatewayApiError> {
    let max_input_chars = state.config.max_input_chars;
    let body_limit = max_input_chars
        .saturating_mul(INPUT_BODY_SIZE_MULTIPLIER)
        .max(max_input_chars);
    if body.len() > body_limit {
        return Err(GatewayApiError::payload_too_large(format!(
            "request body exceeds max size of {body_limit} bytes"
        )));
    }

    let request = serde_json::from_slice::<PromptRequest>(body).map_err(|error| {
        GatewayApiError::bad_request(
            "malformed_json",
            format!("failed to parse request body: {error}"),
        )
    })?;
    if request.prompt.trim().is_empty() {
        return Err(GatewayApiError::bad_request(
            "empty_prompt",
            "prompt must not be empty",
        ));
    }
    if request.prompt.chars().count() > max_input_chars {
        return Err(GatewayApiError::payload_too_large(format!(
            "prompt exceeds max {max_input_chars} characters"
        )));
    }
    Ok(request.prompt)
}

/// Runs one prompt against the conversation's history.
///
/// The conversation lock is held from the history read until the exchange is appended,
/// so turns on the same conversation never interleave. Nothing is stored when the turn
/// fails or times out.
async fn execute_chat_turn(
    state: &GatewayServerState,
    conversation_id: &str,
    prompt: &str,
) -> Result<String, GatewayApiError> {
    let mut history = state.conversations.lock(conversation_id).await;
    let started = Instant::now();

    let mut agent = Agent::new(
        state.config.client.clone(),
        AgentConfig {
            model: state.config.model.clone(),
            system_prompt: state.config.system_prompt.clone(),
            max_turns: state.config.max_turns,
            ..AgentConfig::default()
        },
    );
    state.config.tool_registrar.register(&mut agent);
    for message in history.iter() {
        agent.append_message(message.to_chat_message());
    }

    let prompt_result = if state.config.turn_timeout_ms == 0 {
        agent.prompt(prompt).await
    } else {
        match tokio::time::timeout(
            Duration::from_millis(state.config.turn_timeout_ms),
            agent.prompt(prompt),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                return Err(GatewayApiError::timeout(
                    "response generation timed out before completion",
                ));
            }
        }
    };
    let new_messages = prompt_result.map_err(|error| {
        GatewayApiError::gateway_failure(format!("model runtime failed: {error}"))
    })?;

    let reply = collect_assistant_reply(&new_messages);
    history.append_exchange(prompt, &reply);
    tracing::info!(
        conversation_id,
        history_len = history.len(),
        new_messages = new_messages.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "chat turn completed"
    );
    Ok(reply)
}

fn collect_assistant_reply(messages: &[Message]) -> String {
    let content = messages
        .iter()
        .filter(|message| message.role == MessageRole::Assistant)
        .map(Message::text_content)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if content.trim().is_empty() {
        EMPTY_REPLY_FALLBACK.to_string()
    } else {
        content
    }
}
