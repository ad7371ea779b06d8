//! Session state and the SessionStore trait.
//!
//! A session is one conversation: its turn history, a running token
//! estimate, the preference profile, and the latest workflow checkpoint.
//! Stores linearize operations per session id; distinct sessions never
//! contend on each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkpoint::WorkflowCheckpoint;
use crate::error::SessionError;
use crate::message::{Message, estimate_message_tokens, estimate_messages_tokens};
use crate::preference::{PreferenceProfile, PreferenceUpdate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,

    #[serde(default)]
    pub turn_history: Vec<Message>,

    /// Estimated tokens in `turn_history`. Grows with every append; only
    /// compaction lowers it.
    #[serde(default)]
    pub token_estimate: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<WorkflowCheckpoint>,

    #[serde(default)]
    pub preferences: PreferenceProfile,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            turn_history: Vec::new(),
            token_estimate: 0,
            checkpoint: None,
            preferences: PreferenceProfile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and grow the token estimate.
    pub fn push(&mut self, message: Message) {
        self.token_estimate += estimate_message_tokens(&message);
        self.turn_history.push(message);
        self.updated_at = Utc::now();
    }

    /// Replace the history wholesale and recompute the estimate from scratch.
    /// Used only by compaction.
    pub fn replace_history(&mut self, history: Vec<Message>) {
        self.token_estimate = estimate_messages_tokens(&history);
        self.turn_history = history;
        self.updated_at = Utc::now();
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.turn_history
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
    }
}

/// Durable keyed storage of sessions.
///
/// Implementations: in-memory (process lifetime) and JSON files.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend name (e.g. "memory", "file").
    fn name(&self) -> &str;

    /// Fetch a session, creating an empty one for an unknown id.
    async fn get_or_create(&self, session_id: &str) -> Result<SessionState, SessionError>;

    /// Append one message to a session's history.
    async fn append_message(&self, session_id: &str, message: Message) -> Result<(), SessionError>;

    /// Persist the latest checkpoint for a session.
    async fn save_checkpoint(
        &self,
        session_id: &str,
        checkpoint: WorkflowCheckpoint,
    ) -> Result<(), SessionError>;

    /// Load the latest checkpoint, if any.
    async fn load_checkpoint(&self, session_id: &str) -> Result<Option<WorkflowCheckpoint>, SessionError>;

    /// Merge a partial preference update and return the resulting profile.
    async fn update_preferences(
        &self,
        session_id: &str,
        update: PreferenceUpdate,
    ) -> Result<PreferenceProfile, SessionError>;

    /// Overwrite a whole session (used after compaction and at turn end).
    async fn save_session(&self, state: SessionState) -> Result<(), SessionError>;

    /// Known session ids, sorted.
    async fn list_sessions(&self) -> Result<Vec<String>, SessionError>;

    /// Evict a session. Returns whether it existed.
    async fn remove(&self, session_id: &str) -> Result<bool, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_grows_estimate() {
        let mut s = SessionState::new("s1");
        s.push(Message::user("12345678")); // 2 + 4
        s.push(Message::assistant("1234")); // 1 + 4
        assert_eq!(s.token_estimate, 11);
        assert_eq!(s.turn_history.len(), 2);
    }

    #[test]
    fn replace_history_recomputes() {
        let mut s = SessionState::new("s1");
        for _ in 0..10 {
            s.push(Message::user("a".repeat(40)));
        }
        s.replace_history(vec![Message::system("summary")]);
        assert_eq!(s.token_estimate, 4 + 2);
    }

    #[test]
    fn last_user_message_skips_assistant() {
        let mut s = SessionState::new("s1");
        s.push(Message::user("first"));
        s.push(Message::assistant("reply"));
        assert_eq!(s.last_user_message().unwrap().content, "first");
    }

    #[test]
    fn older_records_without_preferences_load() {
        let json = r#"{"session_id":"s9","created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}"#;
        let s: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(s.token_estimate, 0);
        assert!(s.checkpoint.is_none());
    }
}
