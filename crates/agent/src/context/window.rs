//! Budget checks and the replace-prefix-with-summary transform.

use tracing::{debug, info};
use tripclaw_config::ContextConfig;
use tripclaw_core::error::CompactionError;
use tripclaw_core::message::{Message, estimate_message_tokens};
use tripclaw_core::session::SessionState;
use tripclaw_core::summarizer::Summarizer;

/// Default compaction threshold in estimated tokens.
pub const DEFAULT_THRESHOLD: usize = 4000;
/// Default upper bound on messages kept verbatim.
pub const DEFAULT_KEEP_RECENT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindowManager {
    threshold: usize,
    keep_recent: usize,
}

impl Default for ContextWindowManager {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_KEEP_RECENT)
    }
}

impl ContextWindowManager {
    pub fn new(threshold: usize, keep_recent: usize) -> Self {
        Self {
            threshold,
            keep_recent: keep_recent.max(1),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.threshold, config.keep_recent_messages)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Token budget for the verbatim tail after compaction.
    pub fn tail_target(&self) -> usize {
        self.threshold / 2
    }

    pub fn should_compact(&self, session: &SessionState) -> bool {
        session.token_estimate > self.threshold
    }

    /// Index where the retained tail begins.
    ///
    /// Walks back from the newest message while the tail stays within
    /// [`tail_target`](Self::tail_target) tokens and `keep_recent` messages.
    /// The newest message is always retained, whatever its size.
    pub fn tail_start(&self, history: &[Message]) -> usize {
        let Some(last) = history.len().checked_sub(1) else {
            return 0;
        };

        let target = self.tail_target();
        let mut start = last;
        let mut tokens = estimate_message_tokens(&history[last]);
        while start > 0 && history.len() - start < self.keep_recent {
            let next = estimate_message_tokens(&history[start - 1]);
            if tokens + next > target {
                break;
            }
            tokens += next;
            start -= 1;
        }
        start
    }

    /// Compact a session that is over budget.
    ///
    /// Under budget the state comes back unchanged. Otherwise the prefix
    /// before [`tail_start`](Self::tail_start) (including any earlier
    /// summary) is summarized and the history becomes `[summary] + tail`.
    /// The checkpoint and preferences are carried over untouched.
    pub async fn compact(
        &self,
        session: &SessionState,
        summarizer: &dyn Summarizer,
    ) -> Result<SessionState, CompactionError> {
        if !self.should_compact(session) {
            return Ok(session.clone());
        }

        let history = &session.turn_history;
        let start = self.tail_start(history);
        if start == 0 {
            debug!(
                session_id = %session.session_id,
                "Nothing before the retained tail; skipping compaction"
            );
            return Ok(session.clone());
        }

        let summary = summarizer.summarize(&history[..start]).await?;
        if summary.trim().is_empty() {
            return Err(CompactionError::EmptySummary);
        }

        let mut compacted = session.clone();
        let mut new_history = Vec::with_capacity(history.len() - start + 1);
        new_history.push(Message::compaction_summary(summary));
        new_history.extend_from_slice(&history[start..]);
        compacted.replace_history(new_history);

        info!(
            session_id = %session.session_id,
            summarizer = summarizer.name(),
            folded = start,
            tokens_before = session.token_estimate,
            tokens_after = compacted.token_estimate,
            "Context compacted"
        );
        Ok(compacted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tripclaw_core::checkpoint::{WorkflowCheckpoint, WorkflowInput};
    use tripclaw_core::preference::{Budget, PreferenceUpdate};

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn summarize(&self, _messages: &[Message]) -> Result<String, CompactionError> {
            Ok(self.0.to_string())
        }
    }

    struct DownSummarizer;

    #[async_trait]
    impl Summarizer for DownSummarizer {
        fn name(&self) -> &str {
            "down"
        }

        async fn summarize(&self, _messages: &[Message]) -> Result<String, CompactionError> {
            Err(CompactionError::SummarizerUnavailable("model offline".into()))
        }
    }

    /// 100 chars -> 25 tokens + 4 overhead = 29 tokens per message.
    fn long_session(messages: usize) -> SessionState {
        let mut s = SessionState::new("s1");
        for i in 0..messages {
            let text = format!("{i:03}{}", "x".repeat(97));
            if i % 2 == 0 {
                s.push(Message::user(text));
            } else {
                s.push(Message::assistant(text));
            }
        }
        s
    }

    #[tokio::test]
    async fn under_budget_is_identity() {
        let manager = ContextWindowManager::new(4000, 20);
        let session = long_session(10);
        assert!(!manager.should_compact(&session));
        let out = manager.compact(&session, &FixedSummarizer("sum")).await.unwrap();
        assert_eq!(out, session);
    }

    #[test]
    fn threshold_is_strict() {
        let manager = ContextWindowManager::new(290, 20);
        let session = long_session(10);
        assert_eq!(session.token_estimate, 290);
        assert!(!manager.should_compact(&session));
        assert!(ContextWindowManager::new(289, 20).should_compact(&session));
    }

    #[tokio::test]
    async fn replaces_prefix_with_summary() {
        let manager = ContextWindowManager::new(500, 20);
        let session = long_session(30);
        let out = manager.compact(&session, &FixedSummarizer("earlier talk")).await.unwrap();

        assert!(out.turn_history[0].is_compaction_summary());
        assert_eq!(out.turn_history[0].content, "earlier talk");
        // tail target 250 tokens -> 8 messages of 29
        assert_eq!(out.turn_history.len(), 9);
        assert_eq!(out.turn_history.last(), session.turn_history.last());
        assert_eq!(
            out.token_estimate,
            tripclaw_core::message::estimate_messages_tokens(&out.turn_history)
        );
        assert!(out.token_estimate < session.token_estimate);
    }

    #[tokio::test]
    async fn keep_recent_caps_the_tail() {
        let manager = ContextWindowManager::new(500, 3);
        let out = manager
            .compact(&long_session(30), &FixedSummarizer("s"))
            .await
            .unwrap();
        assert_eq!(out.turn_history.len(), 4);
    }

    #[tokio::test]
    async fn last_message_survives_even_when_huge() {
        let manager = ContextWindowManager::new(100, 20);
        let mut session = long_session(6);
        session.push(Message::user("y".repeat(2000)));
        let out = manager.compact(&session, &FixedSummarizer("s")).await.unwrap();
        assert_eq!(out.turn_history.len(), 2);
        assert_eq!(out.turn_history[1].content, "y".repeat(2000));
    }

    #[tokio::test]
    async fn single_message_over_budget_is_left_alone() {
        let manager = ContextWindowManager::new(10, 20);
        let mut session = SessionState::new("s1");
        session.push(Message::user("z".repeat(400)));
        let out = manager.compact(&session, &FixedSummarizer("s")).await.unwrap();
        assert_eq!(out, session);
    }

    #[tokio::test]
    async fn checkpoint_and_preferences_untouched() {
        let manager = ContextWindowManager::new(200, 20);
        let mut session = long_session(20);
        session.checkpoint = Some(WorkflowCheckpoint::start(
            "recommendation",
            "search_places",
            WorkflowInput::new("Shanghai"),
        ));
        session.preferences.merge(PreferenceUpdate {
            budget: Some(Budget::Luxury),
            ..Default::default()
        });

        let out = manager.compact(&session, &FixedSummarizer("s")).await.unwrap();
        assert_eq!(out.checkpoint, session.checkpoint);
        assert_eq!(out.preferences, session.preferences);
    }

    #[tokio::test]
    async fn summarizer_failure_propagates() {
        let manager = ContextWindowManager::new(100, 20);
        let err = manager.compact(&long_session(10), &DownSummarizer).await.unwrap_err();
        assert!(matches!(err, CompactionError::SummarizerUnavailable(_)));
    }

    #[tokio::test]
    async fn blank_summary_is_rejected() {
        let manager = ContextWindowManager::new(100, 20);
        let err = manager
            .compact(&long_session(10), &FixedSummarizer("  "))
            .await
            .unwrap_err();
        assert_eq!(err, CompactionError::EmptySummary);
    }

    #[tokio::test]
    async fn same_input_same_structure() {
        let manager = ContextWindowManager::new(500, 20);
        let session = long_session(30);
        let a = manager.compact(&session, &FixedSummarizer("s")).await.unwrap();
        let b = manager.compact(&session, &FixedSummarizer("s")).await.unwrap();
        let contents = |s: &SessionState| {
            s.turn_history.iter().map(|m| m.content.clone()).collect::<Vec<_>>()
        };
        assert_eq!(contents(&a), contents(&b));
        assert_eq!(a.token_estimate, b.token_estimate);
    }
}
