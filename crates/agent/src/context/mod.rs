//! Context window management.
//!
//! Keeps a session's turn history under a token budget by folding the oldest
//! run of messages into one summary message. Compaction works only on the
//! conversation; workflow checkpoints are never summarized.

pub mod summarizer;
pub mod window;

pub use summarizer::ExtractiveSummarizer;
pub use window::ContextWindowManager;
