//! Turn policy: decides what a turn does once middleware has run.
//!
//! The orchestrator treats the decision as opaque; [`RuleBasedPolicy`] is the
//! keyword-driven default and can be swapped for a model-backed policy.

use chrono::{Days, Utc};
use serde_json::json;
use tripclaw_core::checkpoint::{MAX_TRIP_DAYS, WorkflowInput};
use tripclaw_core::tool::ToolInvocation;

use crate::middleware::directive::{DESTINATION_WORDS, PLANNING_WORDS, REVIEW_WORDS, TRANSIT_WORDS};
use crate::middleware::{ConversationMode, TurnContext};
use crate::preferences::mentions_any;

/// What the orchestrator should do with this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnAction {
    /// Answer directly.
    Reply(String),
    /// Call these tools in order and report the results.
    CallTools(Vec<ToolInvocation>),
    /// Start a fresh recommendation run.
    RunWorkflow(WorkflowInput),
    /// Resume the session's unfinished checkpoint.
    Resume,
}

pub trait TurnPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn decide(&self, ctx: &TurnContext) -> TurnAction;
}

const RESUME_WORDS: &[&str] = &["retry", "resume", "continue", "try again", "重试", "继续"];
const WEATHER_WORDS: &[&str] = &["weather", "forecast", "天气"];
const SIGHTS_WORDS: &[&str] = &["attractions", "sights", "景点"];
const FOOD_WORDS: &[&str] = &["food", "eat", "restaurants", "美食"];

const DEFAULT_DAYS: u32 = 2;

/// Cities the policy recognises, with English and Chinese spellings.
const CITIES: &[(&str, &[&str])] = &[
    ("Beijing", &["beijing", "北京"]),
    ("Shanghai", &["shanghai", "上海"]),
    ("Hangzhou", &["hangzhou", "杭州"]),
    ("Chengdu", &["chengdu", "成都"]),
    ("Xi'an", &["xi'an", "xian", "西安"]),
    ("Guangzhou", &["guangzhou", "广州"]),
    ("Shenzhen", &["shenzhen", "深圳"]),
    ("Suzhou", &["suzhou", "苏州"]),
    ("Nanjing", &["nanjing", "南京"]),
    ("Chongqing", &["chongqing", "重庆"]),
    ("Xiamen", &["xiamen", "厦门"]),
];

pub const PREFERENCE_PROMPT: &str = "To personalise your trip, tell me:\n\
1. What you enjoy: history, nature, food, shopping, family activities or art\n\
2. How you like to get around: walking, public transport, driving or mixed\n\
3. Your pace: relaxed (2-3 stops a day), moderate (3-4) or packed (4-5)\n\
4. Your budget: economy, comfort or luxury\n\
5. Any special needs, such as travelling with children or wheelchair access\n\n\
For example: \"I like history and food, prefer walking, a relaxed pace and a comfort budget.\"";

const GENERAL_PROMPT: &str = "I can look up trains, weather, sights and reviews, or plan a whole trip. \
Try \"Plan 2 days in Shanghai\" or \"Trains from Beijing to Shanghai tomorrow\".";

/// Known cities in order of first mention.
pub fn cities_in(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let mut found: Vec<(usize, &'static str)> = CITIES
        .iter()
        .filter_map(|(name, spellings)| {
            spellings
                .iter()
                .filter_map(|s| lower.find(s))
                .min()
                .map(|pos| (pos, *name))
        })
        .collect();
    found.sort_unstable();
    found.into_iter().map(|(_, name)| name).collect()
}

fn number_word(word: &str) -> Option<u32> {
    Some(match word {
        "one" | "一" => 1,
        "two" | "两" | "二" => 2,
        "three" | "三" => 3,
        "four" | "四" => 4,
        "five" | "五" => 5,
        "six" | "六" => 6,
        "seven" | "七" => 7,
        _ => return None,
    })
}

/// Trip length from phrases like "3 days", "two-day", "3天" or "三日游".
pub fn parse_days(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let chars: Vec<(usize, char)> = lower.char_indices().collect();

    for (idx, &(pos, c)) in chars.iter().enumerate() {
        let (value, rest_at) = if c.is_ascii_digit() {
            if idx > 0 && chars[idx - 1].1.is_ascii_digit() {
                continue;
            }
            let digits: String = lower[pos..].chars().take_while(char::is_ascii_digit).collect();
            match digits.parse::<u32>() {
                Ok(v) => (v, pos + digits.len()),
                Err(_) => continue,
            }
        } else if let Some(v) = number_word(&c.to_string()) {
            (v, pos + c.len_utf8())
        } else if c.is_ascii_alphabetic() && (idx == 0 || !chars[idx - 1].1.is_ascii_alphabetic()) {
            let word: String = lower[pos..].chars().take_while(char::is_ascii_alphabetic).collect();
            match number_word(&word) {
                Some(v) => (v, pos + word.len()),
                None => continue,
            }
        } else {
            continue;
        };

        let rest = lower[rest_at..].trim_start_matches([' ', '-']);
        if rest.starts_with("day") || rest.starts_with('天') || rest.starts_with('日') {
            return Some(value.clamp(1, MAX_TRIP_DAYS));
        }
    }
    None
}

/// A train number such as `G1033` in the original text.
fn train_code(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_uppercase)
        .find(|w| {
            let mut chars = w.chars();
            matches!(chars.next(), Some('G' | 'D' | 'K' | 'T' | 'Z' | 'C'))
                && (2..=5).contains(&w.len())
                && chars.all(|c| c.is_ascii_digit())
        })
}

fn days_after_today(lower: &str) -> u64 {
    if mentions_any(lower, &["today", "今天"]) {
        0
    } else if mentions_any(lower, &["day after tomorrow", "后天"]) {
        2
    } else {
        1
    }
}

/// Keyword rules, checked in order: resume, plan, transit, reviews,
/// weather, sights, then a mode-appropriate reply.
#[derive(Debug, Default)]
pub struct RuleBasedPolicy;

impl RuleBasedPolicy {
    fn transit(&self, lower: &str, original: &str, cities: &[&str]) -> TurnAction {
        if let Some(code) = train_code(original) {
            let offset = days_after_today(lower);
            let date = Utc::now()
                .date_naive()
                .checked_add_days(Days::new(offset))
                .unwrap_or_else(|| Utc::now().date_naive());
            return TurnAction::CallTools(vec![ToolInvocation::new(
                "train_stations",
                json!({ "train_code": code, "depart_date": date.format("%Y-%m-%d").to_string() }),
            )]);
        }
        match cities {
            [from, to, ..] => TurnAction::CallTools(vec![ToolInvocation::new(
                "train_tickets",
                json!({
                    "from_city": from,
                    "to_city": to,
                    "days_after_today": days_after_today(lower),
                }),
            )]),
            _ => TurnAction::Reply(
                "Which cities are you travelling between? For example: \"Trains from Beijing to Shanghai tomorrow\"."
                    .into(),
            ),
        }
    }

    fn mode_reply(&self, ctx: &TurnContext) -> String {
        let prefs = &ctx.session.preferences;
        match ctx.mode {
            ConversationMode::PreferenceElicitation if ctx.preferences_updated => format!(
                "Noted.\n\n{}\n\nName a city and how many days, and I'll plan around these.",
                prefs.summary()
            ),
            ConversationMode::PreferenceElicitation if prefs.has_collected_any() => {
                format!("{}\n\n{PREFERENCE_PROMPT}", prefs.summary())
            }
            ConversationMode::PreferenceElicitation | ConversationMode::Planning => PREFERENCE_PROMPT.to_string(),
            ConversationMode::TransitLookup => {
                "Tell me the departure and arrival cities, or a train number like G1033.".into()
            }
            ConversationMode::ReviewLookup | ConversationMode::DestinationLookup => {
                "Which city do you mean? I can cover Beijing, Shanghai, Hangzhou, Xi'an, Chengdu and more.".into()
            }
            ConversationMode::General => GENERAL_PROMPT.to_string(),
        }
    }
}

impl TurnPolicy for RuleBasedPolicy {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn decide(&self, ctx: &TurnContext) -> TurnAction {
        let text = ctx.user_text.as_str();
        let lower = text.to_lowercase();
        let cities = cities_in(&lower);

        let resumable = ctx.session.checkpoint.as_ref().is_some_and(|cp| cp.is_resumable());
        if resumable && mentions_any(&lower, RESUME_WORDS) {
            return TurnAction::Resume;
        }

        if mentions_any(&lower, PLANNING_WORDS) && !mentions_any(&lower, TRANSIT_WORDS) {
            if let Some(city) = cities.first() {
                let input = WorkflowInput::new(*city)
                    .with_query(text)
                    .with_days(parse_days(&lower).unwrap_or(DEFAULT_DAYS));
                return TurnAction::RunWorkflow(input);
            }
        }

        if mentions_any(&lower, TRANSIT_WORDS) {
            return self.transit(&lower, text, &cities);
        }

        if let Some(city) = cities.first() {
            if mentions_any(&lower, REVIEW_WORDS) {
                return TurnAction::CallTools(vec![ToolInvocation::new(
                    "web_search",
                    json!({ "query": text, "num_results": 3 }),
                )]);
            }
            if mentions_any(&lower, WEATHER_WORDS) {
                return TurnAction::CallTools(vec![ToolInvocation::new("weather", json!({ "city": city }))]);
            }
            if mentions_any(&lower, DESTINATION_WORDS) {
                let keywords = if mentions_any(&lower, FOOD_WORDS) {
                    "local food"
                } else if mentions_any(&lower, SIGHTS_WORDS) {
                    "attractions"
                } else {
                    "landmarks"
                };
                return TurnAction::CallTools(vec![ToolInvocation::new(
                    "poi_search",
                    json!({ "city": city, "keywords": keywords, "limit": 5 }),
                )]);
            }
        }

        TurnAction::Reply(self.mode_reply(ctx))
    }
}
