//! Turn orchestration for tripclaw.
//!
//! Each user turn flows through the same steps:
//!
//! 1. **Load** the session and merge any preferences stated in the text
//! 2. **Before-turn middleware**: context compaction, then mode selection
//! 3. **Decide** with the turn policy: reply, call tools or run the workflow
//! 4. **Persist** the session, checkpoint included
//! 5. **After-turn middleware**: duplicate and false-claim cleanup
//!
//! The workflow itself lives in `tripclaw-workflow`; this crate decides when
//! to start it and when to resume it.

pub mod context;
pub mod middleware;
pub mod orchestrator;
pub mod policy;
pub mod preferences;
pub mod reply;
pub mod text;

pub use context::{ContextWindowManager, ExtractiveSummarizer};
pub use middleware::{
    CompactionStage, ConversationMode, DirectiveStage, Flow, Middleware, Pipeline, ResponseCleanupStage,
    TurnContext,
};
pub use orchestrator::{Orchestrator, TurnRequest, TurnResponse};
pub use policy::{RuleBasedPolicy, TurnAction, TurnPolicy};
pub use preferences::{extract_preferences, talks_about_preferences};
