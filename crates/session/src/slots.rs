//! Per-session slots shared by the store backends.
//!
//! Each session id owns one `Mutex<SessionState>`. The outer map lock is held
//! only long enough to find or insert a slot, so sessions never wait on each
//! other while a mutation is in flight.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tripclaw_core::session::SessionState;

pub(crate) type Slot = Arc<Mutex<SessionState>>;

#[derive(Default)]
pub(crate) struct SessionSlots {
    map: RwLock<HashMap<String, Slot>>,
}

impl SessionSlots {
    pub(crate) async fn get(&self, session_id: &str) -> Option<Slot> {
        self.map.read().await.get(session_id).cloned()
    }

    /// Find the slot for `session_id`, creating it with `init` on first use.
    pub(crate) async fn get_or_try_insert<E>(
        &self,
        session_id: &str,
        init: impl FnOnce() -> Result<SessionState, E>,
    ) -> Result<Slot, E> {
        if let Some(slot) = self.get(session_id).await {
            return Ok(slot);
        }
        let mut map = self.map.write().await;
        if let Some(slot) = map.get(session_id) {
            return Ok(slot.clone());
        }
        let slot = Arc::new(Mutex::new(init()?));
        map.insert(session_id.to_string(), slot.clone());
        Ok(slot)
    }

    pub(crate) async fn ids(&self) -> Vec<String> {
        self.map.read().await.keys().cloned().collect()
    }

    pub(crate) async fn remove(&self, session_id: &str) -> bool {
        self.map.write().await.remove(session_id).is_some()
    }
}
