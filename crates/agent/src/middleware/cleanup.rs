use async_trait::async_trait;
use tripclaw_core::error::MiddlewareError;

use super::{Middleware, TurnContext};
use crate::text::{remove_duplicate_content, sanitize_preference_claims};

/// Post-processes free-text replies: drops repeated blocks and, while no
/// preference has been collected, any sentence claiming one was saved.
/// Replies rendered from tool or workflow output pass through unchanged.
#[derive(Debug, Default)]
pub struct ResponseCleanupStage;

#[async_trait]
impl Middleware for ResponseCleanupStage {
    fn name(&self) -> &str {
        "response_cleanup"
    }

    async fn after_turn(&self, ctx: &mut TurnContext, reply: &mut String) -> Result<(), MiddlewareError> {
        if ctx.reply_rendered {
            return Ok(());
        }
        let mut cleaned = remove_duplicate_content(reply);
        if !ctx.session.preferences.has_collected_any() && !ctx.talks_about_preferences {
            cleaned = sanitize_preference_claims(&cleaned);
        }
        *reply = cleaned;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripclaw_core::preference::{Pace, PreferenceUpdate};
    use tripclaw_core::session::SessionState;

    const CLAIM: &str = "I've updated your preferences to relaxed. Enjoy Suzhou.";

    #[tokio::test]
    async fn claims_removed_without_preferences() {
        let mut ctx = TurnContext::new(SessionState::new("s1"), "hi");
        let mut reply = CLAIM.to_string();
        ResponseCleanupStage.after_turn(&mut ctx, &mut reply).await.unwrap();
        assert_eq!(reply, " Enjoy Suzhou.");
    }

    #[tokio::test]
    async fn claims_kept_once_preferences_exist() {
        let mut session = SessionState::new("s1");
        session.preferences.merge(PreferenceUpdate {
            pace: Some(Pace::Relaxed),
            ..Default::default()
        });
        let mut ctx = TurnContext::new(session, "hi");
        let mut reply = CLAIM.to_string();
        ResponseCleanupStage.after_turn(&mut ctx, &mut reply).await.unwrap();
        assert_eq!(reply, CLAIM);
    }

    #[tokio::test]
    async fn rendered_replies_keep_repeated_lines() {
        let mut ctx = TurnContext::new(SessionState::new("s1"), "plan");
        ctx.reply_rendered = true;
        let plan = "### 1. Museum\nReview: Calm in the morning.\n\n### 2. Old Street\nReview: Calm in the morning.";
        let mut reply = plan.to_string();
        ResponseCleanupStage.after_turn(&mut ctx, &mut reply).await.unwrap();
        assert_eq!(reply, plan);
    }

    #[tokio::test]
    async fn duplicates_always_removed() {
        let mut ctx = TurnContext::new(SessionState::new("s1"), "hi");
        ctx.talks_about_preferences = true;
        let mut reply = "line\nline".to_string();
        ResponseCleanupStage.after_turn(&mut ctx, &mut reply).await.unwrap();
        assert_eq!(reply, "line");
    }
}
