use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;
use tripclaw_core::error::MiddlewareError;
use tripclaw_core::event::{DomainEvent, EventBus};
use tripclaw_core::summarizer::Summarizer;

use super::{Flow, Middleware, TurnContext};
use crate::context::ContextWindowManager;

/// Compacts the session before the turn when it is over budget.
///
/// A summarizer failure never aborts the turn: it is recorded as a warning
/// and the turn proceeds with the uncompacted history.
pub struct CompactionStage {
    manager: ContextWindowManager,
    summarizer: Arc<dyn Summarizer>,
    events: Arc<EventBus>,
}

impl CompactionStage {
    pub fn new(manager: ContextWindowManager, summarizer: Arc<dyn Summarizer>, events: Arc<EventBus>) -> Self {
        Self {
            manager,
            summarizer,
            events,
        }
    }
}

#[async_trait]
impl Middleware for CompactionStage {
    fn name(&self) -> &str {
        "compaction"
    }

    async fn before_turn(&self, ctx: &mut TurnContext) -> Result<Flow, MiddlewareError> {
        if !self.manager.should_compact(&ctx.session) {
            return Ok(Flow::Continue);
        }

        match self.manager.compact(&ctx.session, self.summarizer.as_ref()).await {
            Ok(compacted) => {
                let tokens_before = ctx.session.token_estimate;
                let tokens_after = compacted.token_estimate;
                ctx.session = compacted;
                if tokens_after < tokens_before {
                    self.events.publish(DomainEvent::ContextCompacted {
                        session_id: ctx.session.session_id.clone(),
                        tokens_before,
                        tokens_after,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => {
                warn!(session_id = %ctx.session_id(), error = %e, "Compaction failed; continuing uncompacted");
                ctx.warnings.push(format!("context compaction skipped: {e}"));
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripclaw_core::error::CompactionError;
    use tripclaw_core::message::Message;
    use tripclaw_core::session::SessionState;

    use crate::context::ExtractiveSummarizer;

    struct Offline;

    #[async_trait]
    impl Summarizer for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        async fn summarize(&self, _messages: &[Message]) -> Result<String, CompactionError> {
            Err(CompactionError::SummarizerUnavailable("connection refused".into()))
        }
    }

    fn big_context() -> TurnContext {
        let mut session = SessionState::new("s1");
        for i in 0..40 {
            session.push(Message::user(format!("Turn {i}. {}", "detail ".repeat(20))));
        }
        TurnContext::new(session, "next")
    }

    #[tokio::test]
    async fn compacts_and_publishes() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let stage = CompactionStage::new(
            ContextWindowManager::new(1000, 20),
            Arc::new(ExtractiveSummarizer::default()),
            events.clone(),
        );

        let mut ctx = big_context();
        let before = ctx.session.token_estimate;
        stage.before_turn(&mut ctx).await.unwrap();

        assert!(ctx.session.turn_history[0].is_compaction_summary());
        assert!(ctx.session.token_estimate < before);
        assert!(ctx.warnings.is_empty());
        match rx.try_recv().unwrap().as_ref() {
            DomainEvent::ContextCompacted { tokens_before, .. } => assert_eq!(*tokens_before, before),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn summarizer_failure_becomes_warning() {
        let stage = CompactionStage::new(
            ContextWindowManager::new(1000, 20),
            Arc::new(Offline),
            Arc::new(EventBus::default()),
        );
        let mut ctx = big_context();
        let before = ctx.session.clone();

        assert_eq!(stage.before_turn(&mut ctx).await.unwrap(), Flow::Continue);
        assert_eq!(ctx.session, before);
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.warnings[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn under_budget_does_nothing() {
        let stage = CompactionStage::new(
            ContextWindowManager::default(),
            Arc::new(Offline),
            Arc::new(EventBus::default()),
        );
        let mut ctx = TurnContext::new(SessionState::new("s1"), "hello");
        stage.before_turn(&mut ctx).await.unwrap();
        assert!(ctx.warnings.is_empty());
    }
}
