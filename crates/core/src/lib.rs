//! # tripclaw Core
//!
//! Domain types, traits, and error definitions for the tripclaw travel
//! planning runtime. Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! Each subsystem seam is a trait here: tools ([`Tool`]), session storage
//! ([`SessionStore`]) and summarization ([`Summarizer`]). Implementations live
//! in their own crates, which keeps external services mockable in tests.

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod message;
pub mod preference;
pub mod session;
pub mod summarizer;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::{CheckpointStatus, MAX_TRIP_DAYS, NodeOutput, WorkflowCheckpoint, WorkflowInput};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use preference::{PreferenceProfile, PreferenceUpdate};
pub use session::{SessionState, SessionStore};
pub use summarizer::Summarizer;
pub use tool::{Tool, ToolInvocation, ToolKind, ToolRegistry, ToolResult, ToolStatus};
