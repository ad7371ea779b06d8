//! Reply cleanup helpers.

use std::collections::HashSet;

/// Replies longer than this are checked for a repeated leading block.
const REPEAT_CHECK_CHARS: usize = 200;
const MAX_WINDOW_CHARS: usize = 500;

const CLAIM_MARKERS: &[&str] = &[
    "updated your preference",
    "updated your travel preference",
    "set your preference",
    "set your travel preference",
    "assumed a preference",
    "已为您更新",
    "已经为您更新",
    "已更新您的偏好",
    "已经更新您的偏好",
    "帮您更新了偏好",
    "为您设置了旅行偏好",
    "我先帮您假设一个偏好",
];

/// Shown when every sentence of a reply was a false preference claim.
pub const NO_PREFERENCES_NOTICE: &str = "No travel preferences are set yet. Tell me what you enjoy, \
how you like to get around, your pace and your budget for more personal suggestions.";

fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Remove repeated content from a generated reply.
///
/// In order: a long reply whose opening block appears again is cut before
/// the repeat; a reply that is one half written twice is halved; repeated
/// paragraphs are dropped; finally repeated non-empty lines are dropped.
pub fn remove_duplicate_content(text: &str) -> String {
    let normalized = text.trim();
    let total = normalized.chars().count();

    if total > REPEAT_CHECK_CHARS {
        let window_chars = (total / 2).min(MAX_WINDOW_CHARS);
        let window = char_prefix(normalized, window_chars);
        if let Some(pos) = normalized[window.len()..].find(window) {
            return normalized[..window.len() + pos].trim().to_string();
        }

        let half = char_prefix(normalized, total / 2);
        let (first, second) = (half.trim(), normalized[half.len()..].trim());
        if !first.is_empty() && first == second {
            return first.to_string();
        }
    }

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    if paragraphs.len() > 1 {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = paragraphs
            .iter()
            .copied()
            .filter(|p| !p.trim().is_empty() && seen.insert(p.trim()))
            .collect();
        if unique.len() < paragraphs.len() {
            return unique.join("\n\n");
        }
    }

    let mut seen = HashSet::new();
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.is_empty() || seen.insert(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = i + c.len_utf8();
        let boundary = match c {
            '。' | '！' | '？' | '\n' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Drop sentences that claim a preference update which never happened.
///
/// Callers apply this only when the profile is empty and the turn did not
/// talk about preferences. If nothing survives, a fixed notice is returned.
pub fn sanitize_preference_claims(text: &str) -> String {
    let kept: String = split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            let about_preferences = lower.contains("preference") || lower.contains("偏好");
            !(about_preferences && CLAIM_MARKERS.iter().any(|m| lower.contains(m)))
        })
        .collect();

    if kept.trim().is_empty() {
        NO_PREFERENCES_NOTICE.to_string()
    } else {
        kept
    }
}
