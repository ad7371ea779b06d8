//! In-memory session store: process-lifetime durability.

use async_trait::async_trait;
use std::convert::Infallible;
use tracing::debug;
use tripclaw_core::checkpoint::WorkflowCheckpoint;
use tripclaw_core::error::SessionError;
use tripclaw_core::message::Message;
use tripclaw_core::preference::{PreferenceProfile, PreferenceUpdate};
use tripclaw_core::session::{SessionState, SessionStore};

use crate::slots::{SessionSlots, Slot};

/// Sessions kept in a map of per-session mutexes.
#[derive(Default)]
pub struct InMemorySessionStore {
    slots: SessionSlots,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, session_id: &str) -> Slot {
        let created = self
            .slots
            .get_or_try_insert(session_id, || {
                debug!(session_id, "Creating session");
                Ok::<_, Infallible>(SessionState::new(session_id))
            })
            .await;
        match created {
            Ok(slot) => slot,
            Err(never) => match never {},
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_or_create(&self, session_id: &str) -> Result<SessionState, SessionError> {
        let slot = self.slot(session_id).await;
        let state = slot.lock().await.clone();
        Ok(state)
    }

    async fn append_message(&self, session_id: &str, message: Message) -> Result<(), SessionError> {
        let slot = self.slot(session_id).await;
        slot.lock().await.push(message);
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        session_id: &str,
        checkpoint: WorkflowCheckpoint,
    ) -> Result<(), SessionError> {
        let slot = self.slot(session_id).await;
        slot.lock().await.checkpoint = Some(checkpoint);
        Ok(())
    }

    async fn load_checkpoint(&self, session_id: &str) -> Result<Option<WorkflowCheckpoint>, SessionError> {
        match self.slots.get(session_id).await {
            Some(slot) => Ok(slot.lock().await.checkpoint.clone()),
            None => Ok(None),
        }
    }

    async fn update_preferences(
        &self,
        session_id: &str,
        update: PreferenceUpdate,
    ) -> Result<PreferenceProfile, SessionError> {
        let slot = self.slot(session_id).await;
        let mut state = slot.lock().await;
        state.preferences.merge(update);
        Ok(state.preferences.clone())
    }

    async fn save_session(&self, state: SessionState) -> Result<(), SessionError> {
        let slot = self.slot(&state.session_id).await;
        *slot.lock().await = state;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut ids = self.slots.ids().await;
        ids.sort();
        Ok(ids)
    }

    async fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self.slots.remove(session_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tripclaw_core::checkpoint::WorkflowInput;
    use tripclaw_core::preference::{Budget, Interest};

    #[tokio::test]
    async fn unknown_session_is_created_fresh() {
        let store = InMemorySessionStore::new();
        let s = store.get_or_create("new-one").await.unwrap();
        assert_eq!(s.session_id, "new-one");
        assert!(s.turn_history.is_empty());
        assert_eq!(store.list_sessions().await.unwrap(), vec!["new-one"]);
    }

    #[tokio::test]
    async fn append_and_reload() {
        let store = InMemorySessionStore::new();
        store.append_message("s1", Message::user("hi")).await.unwrap();
        store.append_message("s1", Message::assistant("hello")).await.unwrap();
        let s = store.get_or_create("s1").await.unwrap();
        assert_eq!(s.turn_history.len(), 2);
        assert!(s.token_estimate > 0);
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = InMemorySessionStore::new();
        assert!(store.load_checkpoint("s1").await.unwrap().is_none());
        let cp = WorkflowCheckpoint::start("recommendation", "search_places", WorkflowInput::new("Chengdu"));
        store.save_checkpoint("s1", cp.clone()).await.unwrap();
        assert_eq!(store.load_checkpoint("s1").await.unwrap(), Some(cp));
    }

    #[tokio::test]
    async fn preference_updates_merge() {
        let store = InMemorySessionStore::new();
        store
            .update_preferences("s1", PreferenceUpdate {
                interests: Some([Interest::Food].into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let profile = store
            .update_preferences("s1", PreferenceUpdate {
                budget: Some(Budget::Economy),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(profile.interests, [Interest::Food].into());
        assert_eq!(profile.budget, Budget::Economy);
    }

    #[tokio::test]
    async fn concurrent_appends_to_one_session_are_all_kept() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_message("shared", Message::user(format!("m{i}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let s = store.get_or_create("shared").await.unwrap();
        assert_eq!(s.turn_history.len(), 50);
    }

    #[tokio::test]
    async fn remove_evicts() {
        let store = InMemorySessionStore::new();
        store.get_or_create("gone").await.unwrap();
        assert!(store.remove("gone").await.unwrap());
        assert!(!store.remove("gone").await.unwrap());
    }
}
