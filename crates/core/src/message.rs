//! Message domain types.
//!
//! Messages are the value objects that make up a session's turn history:
//! the user speaks, the assistant answers, and compaction occasionally folds
//! the oldest turns into a single system summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key marking a message produced by context compaction.
pub const COMPACTION_SUMMARY_KEY: &str = "compaction_summary";

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
    /// System directives and compaction summaries
    System,
    /// Tool output echoed into the history
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool output message.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, content)
    }

    /// Create the summary message that replaces a compacted history prefix.
    pub fn compaction_summary(content: impl Into<String>) -> Self {
        let mut msg = Self::system(content);
        msg.metadata
            .insert(COMPACTION_SUMMARY_KEY.into(), serde_json::Value::Bool(true));
        msg
    }

    /// Whether this message was produced by compaction.
    pub fn is_compaction_summary(&self) -> bool {
        self.metadata
            .get(COMPACTION_SUMMARY_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Each message costs ~4 tokens of overhead for role name and delimiters.
pub fn estimate_message_tokens(message: &Message) -> usize {
    4 + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Plan two days in Hangzhou");
        assert_eq!(msg.role, Role::User);
        assert!(!msg.is_compaction_summary());
    }

    #[test]
    fn summary_message_is_flagged() {
        let msg = Message::compaction_summary("earlier: user likes food");
        assert_eq!(msg.role, Role::System);
        assert!(msg.is_compaction_summary());
    }

    #[test]
    fn token_heuristic_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn message_includes_overhead() {
        let msgs = vec![Message::user("hello"), Message::assistant("world")];
        assert_eq!(estimate_message_tokens(&msgs[0]), 6);
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }

    #[test]
    fn metadata_survives_serialization() {
        let msg = Message::compaction_summary("sum");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(back.is_compaction_summary());
    }
}
