//! Deterministic summarizer used when no model-backed one is configured.

use async_trait::async_trait;
use tripclaw_core::error::CompactionError;
use tripclaw_core::message::{Message, Role};
use tripclaw_core::summarizer::Summarizer;

const HEADER: &str = "Summary of earlier conversation:";
const DEFAULT_MAX_CHARS: usize = 1200;
const SENTENCE_CHARS: usize = 120;

/// One bullet per user/assistant message holding its first sentence.
///
/// Bullets from an earlier summary in the input are carried forward, so
/// repeated compaction keeps the oldest facts. Output is capped at
/// `max_chars`; the newest bullets win when the cap is hit.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_chars: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl ExtractiveSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?' | '\n' | '。' | '！' | '？'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(text.len());
    let sentence = text[..end].trim();
    if sentence.chars().count() > SENTENCE_CHARS {
        let cut: String = sentence.chars().take(SENTENCE_CHARS).collect();
        format!("{cut}...")
    } else {
        sentence.to_string()
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, CompactionError> {
        let mut bullets = Vec::new();
        for message in messages {
            if message.is_compaction_summary() {
                bullets.extend(
                    message
                        .content
                        .lines()
                        .filter(|l| l.starts_with("- "))
                        .map(str::to_string),
                );
                continue;
            }
            let label = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System | Role::Tool => continue,
            };
            let sentence = first_sentence(&message.content);
            if !sentence.is_empty() {
                bullets.push(format!("- {label}: {sentence}"));
            }
        }

        if bullets.is_empty() {
            return Err(CompactionError::EmptySummary);
        }

        // Keep the newest bullets that fit.
        let mut budget = self.max_chars.saturating_sub(HEADER.len());
        let mut kept = Vec::new();
        for bullet in bullets.iter().rev() {
            let cost = bullet.len() + 1;
            if cost > budget {
                break;
            }
            budget -= cost;
            kept.push(bullet.as_str());
        }
        kept.reverse();

        let mut summary = String::from(HEADER);
        if kept.len() < bullets.len() {
            summary.push_str("\n- ...");
        }
        for bullet in kept {
            summary.push('\n');
            summary.push_str(bullet);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_bullet_per_turn() {
        let messages = vec![
            Message::user("I want to visit Hangzhou. Maybe in spring."),
            Message::assistant("Hangzhou is lovely in April! West Lake is a must."),
            Message::tool("{\"city\":\"Hangzhou\"}"),
        ];
        let summary = ExtractiveSummarizer::default().summarize(&messages).await.unwrap();
        assert_eq!(
            summary,
            "Summary of earlier conversation:\n- user: I want to visit Hangzhou.\n- assistant: Hangzhou is lovely in April!"
        );
    }

    #[tokio::test]
    async fn chinese_sentences_split() {
        let messages = vec![Message::user("我想去上海。预算舒适。")];
        let summary = ExtractiveSummarizer::default().summarize(&messages).await.unwrap();
        assert!(summary.ends_with("- user: 我想去上海。"));
    }

    #[tokio::test]
    async fn earlier_summary_is_carried_forward() {
        let first = ExtractiveSummarizer::default()
            .summarize(&[Message::user("Budget is comfort.")])
            .await
            .unwrap();
        let messages = vec![
            Message::compaction_summary(first),
            Message::user("Now think about Xi'an."),
        ];
        let summary = ExtractiveSummarizer::default().summarize(&messages).await.unwrap();
        assert!(summary.contains("- user: Budget is comfort."));
        assert!(summary.contains("- user: Now think about Xi'an."));
        assert_eq!(summary.matches(HEADER).count(), 1);
    }

    #[tokio::test]
    async fn cap_keeps_newest() {
        let messages: Vec<Message> = (0..50)
            .map(|i| Message::user(format!("Message number {i} is here.")))
            .collect();
        let summary = ExtractiveSummarizer::new(200).summarize(&messages).await.unwrap();
        assert!(summary.len() <= 200 + 6);
        assert!(summary.contains("Message number 49"));
        assert!(!summary.contains("Message number 0 "));
        assert!(summary.contains("- ..."));
    }

    #[tokio::test]
    async fn nothing_to_summarize_is_an_error() {
        let err = ExtractiveSummarizer::default()
            .summarize(&[Message::system("directive")])
            .await
            .unwrap_err();
        assert_eq!(err, CompactionError::EmptySummary);
    }

    #[test]
    fn long_sentence_is_cut() {
        let s = first_sentence(&"word ".repeat(60));
        assert_eq!(s.chars().count(), SENTENCE_CHARS + 3);
    }
}
