//! In-memory conversation histories keyed by caller-supplied conversation id.
//!
//! Conversations are created on first reference, live for the process lifetime and are
//! only ever appended to. Each conversation sits behind its own async mutex so a chat
//! turn can hold it from the history read to the final append.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use gitpilot_ai::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            content: content.into(),
        }
    }

    /// Chat message replayed into a model session under the stored role.
    pub fn to_chat_message(&self) -> Message {
        match self.role {
            ConversationRole::User => Message::user(self.content.clone()),
            ConversationRole::Assistant => Message::assistant_text(self.content.clone()),
        }
    }
}

pub type ConversationHandle = Arc<tokio::sync::Mutex<Vec<ConversationMessage>>>;

/// Exclusive access to one conversation's history until dropped.
///
/// Reads go through `Deref`; the only write is [`ConversationGuard::append_exchange`].
pub struct ConversationGuard {
    inner: OwnedMutexGuard<Vec<ConversationMessage>>,
}

impl ConversationGuard {
    /// Appends the user prompt and the assistant reply as one exchange.
    pub fn append_exchange(&mut self, user: &str, assistant: &str) {
        self.inner.push(ConversationMessage::user(user));
        self.inner.push(ConversationMessage::assistant(assistant));
    }
}

impl Deref for ConversationGuard {
    type Target = [ConversationMessage];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Default)]
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, ConversationHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `key`, creating an empty history if the key is unseen.
    pub fn entry(&self, key: &str) -> ConversationHandle {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        conversations
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Vec::new())))
            .clone()
    }

    /// Waits for and takes the conversation's lock.
    pub async fn lock(&self, key: &str) -> ConversationGuard {
        ConversationGuard {
            inner: self.entry(key).lock_owned().await,
        }
    }

    pub async fn history(&self, key: &str) -> Vec<ConversationMessage> {
        self.entry(key).lock().await.clone()
    }

    pub async fn append_exchange(&self, key: &str, user: &str, assistant: &str) {
        self.lock(key).await.append_exchange(user, assistant);
    }

    /// Number of conversations referenced so far.
    pub fn len(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gitpilot_ai::MessageRole;

    use super::{ConversationMessage, ConversationRole, ConversationStore};

    #[tokio::test]
    async fn unit_unseen_key_starts_empty_and_is_created_lazily() {
        let store = ConversationStore::new();
        assert!(store.is_empty());

        assert!(store.history("fresh").await.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn functional_exchanges_alternate_roles_in_call_order() {
        let store = ConversationStore::new();
        for round in 0..3 {
            store
                .append_exchange("c1", &format!("q{round}"), &format!("a{round}"))
                .await;
        }

        let history = store.history("c1").await;
        assert_eq!(history.len(), 6);
        for (index, message) in history.iter().enumerate() {
            let expected_role = if index % 2 == 0 {
                ConversationRole::User
            } else {
                ConversationRole::Assistant
            };
            assert_eq!(message.role, expected_role);
        }
        assert_eq!(history[4], ConversationMessage::user("q2"));
        assert_eq!(history[5], ConversationMessage::assistant("a2"));
        assert!(store.history("c2").await.is_empty());
    }

    #[tokio::test]
    async fn regression_concurrent_exchanges_on_one_key_are_all_kept() {
        let store = Arc::new(ConversationStore::new());
        let mut handles = Vec::new();
        for index in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_exchange("shared", &format!("q{index}"), &format!("a{index}"))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.expect("append task");
        }

        let history = store.history("shared").await;
        assert_eq!(history.len(), 32);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }

    #[tokio::test]
    async fn functional_held_guard_appends_visible_after_release() {
        let store = ConversationStore::new();
        {
            let mut history = store.lock("c1").await;
            assert!(history.is_empty());
            history.append_exchange("q0", "a0");
            assert_eq!(history.len(), 2);
        }
        assert_eq!(
            store.history("c1").await,
            vec![
                ConversationMessage::user("q0"),
                ConversationMessage::assistant("a0")
            ]
        );
    }

    #[test]
    fn unit_replay_keeps_stored_roles() {
        let user = ConversationMessage::user("hi").to_chat_message();
        let assistant = ConversationMessage::assistant("hello").to_chat_message();
        assert_eq!(user.role, MessageRole::User);
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert_eq!(assistant.text_content(), "hello");
    }

    #[test]
    fn unit_roles_serialize_lowercase() {
        let encoded = serde_json::to_value(ConversationMessage::assistant("x")).expect("encode");
        assert_eq!(encoded["role"], "assistant");
    }
}
