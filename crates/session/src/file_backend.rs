//! File-based session store: one JSON document per session.
//!
//! Storage location: `~/.tripclaw/sessions/<escaped-id>.json`
//!
//! Sessions are loaded lazily on first reference and written back after every
//! mutation while the session's lock is still held. Writes go to a temporary
//! sibling file which is then renamed over the target, so a crash mid-write
//! leaves the previous version intact.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tripclaw_core::checkpoint::WorkflowCheckpoint;
use tripclaw_core::error::SessionError;
use tripclaw_core::message::Message;
use tripclaw_core::preference::{PreferenceProfile, PreferenceUpdate};
use tripclaw_core::session::{SessionState, SessionStore};

use crate::slots::{SessionSlots, Slot};

const EXTENSION: &str = "json";

pub struct FileSessionStore {
    dir: PathBuf,
    slots: SessionSlots,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File session store opened");
        Self {
            dir,
            slots: SessionSlots::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", encode_file_stem(session_id)))
    }

    async fn slot(&self, session_id: &str) -> Result<Slot, SessionError> {
        if let Some(slot) = self.slots.get(session_id).await {
            return Ok(slot);
        }
        // Read outside the map lock; a racing loader simply loses the insert.
        let loaded = self.read_from_disk(session_id).await?;
        self.slots
            .get_or_try_insert(session_id, || {
                Ok::<_, SessionError>(loaded.unwrap_or_else(|| SessionState::new(session_id)))
            })
            .await
    }

    async fn read_from_disk(&self, session_id: &str) -> Result<Option<SessionState>, SessionError> {
        let path = self.path_for(session_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        let state = decode_session(session_id, &content)?;
        debug!(session_id, messages = state.turn_history.len(), "Session loaded from disk");
        Ok(Some(state))
    }

    async fn flush(&self, state: &SessionState) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let body = serde_json::to_string_pretty(state)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let target = self.path_for(&state.session_id);
        let tmp = target.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, body.as_bytes())
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &target).await.map_err(|e| {
            SessionError::Storage(format!("Failed to replace {}: {e}", target.display()))
        })?;
        Ok(())
    }

    /// Run `f` against the session under its lock, then persist the result.
    async fn mutate<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionState) -> T,
    ) -> Result<T, SessionError> {
        let slot = self.slot(session_id).await?;
        let mut state = slot.lock().await;
        let mut next = state.clone();
        let out = f(&mut next);
        self.flush(&next).await?;
        *state = next;
        Ok(out)
    }

    async fn ids_on_disk(&self) -> Result<Vec<String>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_file_stem(stem) {
                Some(id) => ids.push(id),
                None => warn!(file = %path.display(), "Skipping file with undecodable name"),
            }
        }
        Ok(ids)
    }
}

/// Parse a stored session. The checkpoint is validated through
/// [`WorkflowCheckpoint::from_record`] so a malformed one is reported as
/// corruption instead of a generic serialization failure.
fn decode_session(session_id: &str, content: &str) -> Result<SessionState, SessionError> {
    let mut doc: serde_json::Map<String, Value> =
        serde_json::from_str(content).map_err(|e| SessionError::Serialization(e.to_string()))?;

    let checkpoint = match doc.remove("checkpoint") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => {
            let record: BTreeMap<String, Value> = map.into_iter().collect();
            Some(WorkflowCheckpoint::from_record(session_id, &record)?)
        }
        Some(other) => {
            return Err(SessionError::CorruptCheckpoint {
                session_id: session_id.to_string(),
                reason: format!("expected an object, found {other}"),
            });
        }
    };

    let mut state: SessionState = serde_json::from_value(Value::Object(doc))
        .map_err(|e| SessionError::Serialization(e.to_string()))?;
    state.checkpoint = checkpoint;
    Ok(state)
}

/// Map a session id onto a file stem: `[A-Za-z0-9-]` pass through, every
/// other byte becomes `_xx` (lowercase hex).
fn encode_file_stem(session_id: &str) -> String {
    let mut out = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_or_create(&self, session_id: &str) -> Result<SessionState, SessionError> {
        let slot = self.slot(session_id).await?;
        let state = slot.lock().await.clone();
        Ok(state)
    }

    async fn append_message(&self, session_id: &str, message: Message) -> Result<(), SessionError> {
        self.mutate(session_id, |s| s.push(message)).await
    }

    async fn save_checkpoint(
        &self,
        session_id: &str,
        checkpoint: WorkflowCheckpoint,
    ) -> Result<(), SessionError> {
        self.mutate(session_id, |s| s.checkpoint = Some(checkpoint))
            .await
    }

    async fn load_checkpoint(&self, session_id: &str) -> Result<Option<WorkflowCheckpoint>, SessionError> {
        let slot = self.slot(session_id).await?;
        let checkpoint = slot.lock().await.checkpoint.clone();
        Ok(checkpoint)
    }

    async fn update_preferences(
        &self,
        session_id: &str,
        update: PreferenceUpdate,
    ) -> Result<PreferenceProfile, SessionError> {
        self.mutate(session_id, |s| {
            s.preferences.merge(update);
            s.preferences.clone()
        })
        .await
    }

    async fn save_session(&self, state: SessionState) -> Result<(), SessionError> {
        let session_id = state.session_id.clone();
        self.mutate(&session_id, move |s| *s = state).await
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut ids: BTreeSet<String> = self.slots.ids().await.into_iter().collect();
        ids.extend(self.ids_on_disk().await?);
        Ok(ids.into_iter().collect())
    }

    async fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        let in_memory = self.slots.remove(session_id).await;
        let on_disk = match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };
        Ok(in_memory || on_disk)
    }
}
