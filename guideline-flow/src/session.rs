use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role of a message within a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single message in a session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for storing and retrieving per-session conversation history
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append one completed turn: the user message followed by the assistant
    /// reply, in that order. Creates the session if it does not exist.
    async fn append_turn(&self, session_id: &str, user: &str, assistant: &str) -> Result<()>;

    /// Message history for a session, oldest first. An unknown session yields
    /// an empty history, not an error.
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// Remove a session. Clearing an unknown session is a no-op.
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: DashMap<String, Vec<ChatMessage>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_turn(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        // Both messages land under one entry guard, so a concurrent reader
        // never observes a half-appended turn.
        let mut history = self.sessions.entry(session_id.to_string()).or_default();
        history.push(ChatMessage::user(user));
        history.push(ChatMessage::assistant(assistant));
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_turn_grows_history_by_two() {
        let store = InMemorySessionStore::new();

        store.append_turn("s1", "hello", "hi there").await.unwrap();
        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("hello"));
        assert_eq!(history[1], ChatMessage::assistant("hi there"));

        store.append_turn("s1", "next", "reply").await.unwrap();
        assert_eq!(store.history("s1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn unknown_session_has_empty_history() {
        let store = InMemorySessionStore::new();
        assert!(store.history("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = InMemorySessionStore::new();

        // Clearing a session that never existed must not error.
        store.clear("gone").await.unwrap();

        store.append_turn("s1", "q", "a").await.unwrap();
        store.clear("s1").await.unwrap();
        assert!(store.history("s1").await.unwrap().is_empty());

        store.clear("s1").await.unwrap();
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.append_turn("a", "q1", "a1").await.unwrap();
        store.append_turn("b", "q2", "a2").await.unwrap();

        assert_eq!(store.history("a").await.unwrap().len(), 2);
        assert_eq!(store.history("b").await.unwrap().len(), 2);

        store.clear("a").await.unwrap();
        assert!(store.history("a").await.unwrap().is_empty());
        assert_eq!(store.history("b").await.unwrap().len(), 2);
    }
}
