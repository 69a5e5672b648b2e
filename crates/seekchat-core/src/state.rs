//! UI-agnostic conversation types
//!
//! These are shared between the core send flow and any front-end that renders
//! the conversation. Nothing here depends on a UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message in the conversation. Immutable once appended to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            reasoning_content: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            reasoning_content: None,
            timestamp: Utc::now(),
        }
    }

    /// Empty reasoning is stored as `None` so the renderer doesn't draw an
    /// empty reasoning section.
    pub fn assistant(content: impl Into<String>, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            timestamp: Utc::now(),
        }
    }
}

/// The participant that produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// An uploaded file waiting to go out with the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    /// Local key used for removal from the pending list.
    pub uid: Uuid,
    pub name: String,
    /// Identifier returned by the upload endpoint.
    pub file_id: String,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            name: name.into(),
            file_id: file_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_assistant_drops_empty_reasoning() {
        let msg = ChatMessage::assistant("hi", "");
        assert_eq!(msg.reasoning_content, None);

        let msg = ChatMessage::assistant("hi", "because");
        assert_eq!(msg.reasoning_content.as_deref(), Some("because"));
    }

    #[test]
    fn test_pending_files_get_distinct_keys() {
        let a = PendingFile::new("a.txt", "f1");
        let b = PendingFile::new("a.txt", "f1");
        assert_ne!(a.uid, b.uid);
    }
}
