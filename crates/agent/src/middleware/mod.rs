//! Turn middleware: ordered stages around every orchestrator turn.
//!
//! Before-turn stages run in registration order on a working copy of the
//! [`TurnContext`]. The copy replaces the caller's context only when every
//! stage succeeded, so a failing stage never leaves a half-applied turn.
//! After-turn stages post-process the reply the same way.
//!
//! Default stages:
//!
//! | Stage | Hook | Effect |
//! |-------|------|--------|
//! | [`CompactionStage`] | before | compacts history over budget |
//! | [`DirectiveStage`] | before | picks the conversation mode and directive |
//! | [`ResponseCleanupStage`] | after | removes repeats and false preference claims |

pub mod cleanup;
pub mod compaction;
pub mod directive;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use tripclaw_core::error::MiddlewareError;
use tripclaw_core::event::EventBus;
use tripclaw_core::session::SessionState;
use tripclaw_core::summarizer::Summarizer;

use crate::context::ContextWindowManager;

pub use cleanup::ResponseCleanupStage;
pub use compaction::CompactionStage;
pub use directive::{ConversationMode, DirectiveStage, select_mode};

/// What the pipeline tells the orchestrator after the before-turn stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the turn policy and answer with this text.
    ShortCircuit(String),
}

/// Mutable payload of one turn as seen by middleware.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session: SessionState,
    pub user_text: String,
    /// Whether this turn described or changed preferences.
    pub talks_about_preferences: bool,
    /// Whether this turn changed the preference profile.
    pub preferences_updated: bool,
    pub mode: ConversationMode,
    pub directive: Option<String>,
    /// The reply was rendered from tool or workflow output rather than
    /// free text; cleanup leaves such replies alone.
    pub reply_rendered: bool,
    pub warnings: Vec<String>,
}

impl TurnContext {
    pub fn new(session: SessionState, user_text: impl Into<String>) -> Self {
        Self {
            session,
            user_text: user_text.into(),
            talks_about_preferences: false,
            preferences_updated: false,
            mode: ConversationMode::General,
            directive: None,
            reply_rendered: false,
            warnings: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    async fn before_turn(&self, _ctx: &mut TurnContext) -> Result<Flow, MiddlewareError> {
        Ok(Flow::Continue)
    }

    async fn after_turn(&self, _ctx: &mut TurnContext, _reply: &mut String) -> Result<(), MiddlewareError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compaction, then directive selection; reply cleanup after the turn.
    pub fn standard(
        manager: ContextWindowManager,
        summarizer: Arc<dyn Summarizer>,
        events: Arc<EventBus>,
    ) -> Self {
        Self::new()
            .with_stage(CompactionStage::new(manager, summarizer, events))
            .with_stage(DirectiveStage)
            .with_stage(ResponseCleanupStage)
    }

    pub fn with_stage(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run before-turn stages. A short-circuit stops the remaining stages
    /// but still commits the work done so far.
    pub async fn run_before(&self, ctx: &mut TurnContext) -> Result<Flow, MiddlewareError> {
        let mut working = ctx.clone();
        for stage in &self.stages {
            debug!(stage = stage.name(), session_id = %ctx.session_id(), "Before-turn stage");
            match stage.before_turn(&mut working).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::ShortCircuit(reply)) => {
                    debug!(stage = stage.name(), "Stage short-circuited the turn");
                    *ctx = working;
                    return Ok(Flow::ShortCircuit(reply));
                }
                Err(e) => {
                    warn!(stage = stage.name(), error = %e, "Before-turn stage failed; turn aborted");
                    return Err(e);
                }
            }
        }
        *ctx = working;
        Ok(Flow::Continue)
    }

    /// Run after-turn stages over the reply.
    pub async fn run_after(&self, ctx: &mut TurnContext, reply: &mut String) -> Result<(), MiddlewareError> {
        let mut working = ctx.clone();
        let mut working_reply = reply.clone();
        for stage in &self.stages {
            if let Err(e) = stage.after_turn(&mut working, &mut working_reply).await {
                warn!(stage = stage.name(), error = %e, "After-turn stage failed");
                return Err(e);
            }
        }
        *ctx = working;
        *reply = working_reply;
        Ok(())
    }
}
