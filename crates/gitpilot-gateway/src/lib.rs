//! HTTP surface of gitpilot: the conversation-keyed chat endpoint and its static assets.

mod chat_server;
pub mod conversation_store;

pub use chat_server::{
    build_gateway_router, run_gateway_server, ChatToolRegistrar, ChatToolRegistrarFn,
    GatewayServerConfig, GatewayServerState, NoopChatToolRegistrar, DEMOPROMPT_ENDPOINT,
};
pub use conversation_store::{ConversationMessage, ConversationRole, ConversationStore};
