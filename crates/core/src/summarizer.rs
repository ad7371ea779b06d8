//! Summarizer trait: the collaborator compaction relies on.
//!
//! In production this is usually a model call and can fail; compaction
//! treats it as fallible and never blocks a turn on it.

use async_trait::async_trait;

use crate::error::CompactionError;
use crate::message::Message;

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    /// Summarize an ordered run of messages into one block of text.
    async fn summarize(&self, messages: &[Message]) -> Result<String, CompactionError>;
}
