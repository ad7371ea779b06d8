//! Dynamic system directive selection.
//!
//! The mode is a pure function of the latest user message and whether any
//! preference has been collected. Keyword groups are checked in a fixed
//! order: preference talk, reviews, transit, destination info, planning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tripclaw_core::error::MiddlewareError;
use tripclaw_core::message::{Message, Role};
use tripclaw_core::preference::PreferenceProfile;

use super::{Flow, Middleware, TurnContext};
use crate::preferences::{mentions_any, talks_about_preferences};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    PreferenceElicitation,
    Planning,
    ReviewLookup,
    TransitLookup,
    DestinationLookup,
    General,
}

pub(crate) const REVIEW_WORDS: &[&str] = &[
    "review",
    "reviews",
    "worth it",
    "worth visiting",
    "how is",
    "rating",
    "怎么样",
    "好不好",
    "值得",
    "评价",
    "口碑",
    "好吃",
    "好玩",
    "哪家好",
    "哪个好",
];

pub(crate) const TRANSIT_WORDS: &[&str] = &[
    "train",
    "trains",
    "high-speed rail",
    "railway",
    "ticket",
    "tickets",
    "station",
    "stations",
    "火车",
    "高铁",
    "动车",
    "车次",
    "余票",
    "经停",
    "12306",
    "列车",
];

pub(crate) const DESTINATION_WORDS: &[&str] = &[
    "weather",
    "forecast",
    "attractions",
    "sights",
    "nearby",
    "directions",
    "how do i get",
    "天气",
    "景点",
    "美食",
    "周边",
    "路线",
    "公交",
    "步行",
    "驾车",
    "地铁",
];

pub(crate) const PLANNING_WORDS: &[&str] = &[
    "plan",
    "planning",
    "itinerary",
    "trip",
    "recommend",
    "规划",
    "行程",
    "计划",
    "安排",
    "推荐",
    "日游",
];

impl ConversationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationMode::PreferenceElicitation => "preference_elicitation",
            ConversationMode::Planning => "planning",
            ConversationMode::ReviewLookup => "review_lookup",
            ConversationMode::TransitLookup => "transit_lookup",
            ConversationMode::DestinationLookup => "destination_lookup",
            ConversationMode::General => "general",
        }
    }

    pub fn directive(&self) -> &'static str {
        match self {
            ConversationMode::PreferenceElicitation => {
                "You are a travel planning assistant collecting the traveller's preferences. \
                 Ask about interests, how they like to get around, pace and budget. \
                 Never claim a preference was saved unless the traveller stated it."
            }
            ConversationMode::Planning => {
                "You are a travel planning assistant. Build day-by-day plans from the \
                 traveller's stored preferences, with hotels inside their budget and routes \
                 in their preferred travel mode."
            }
            ConversationMode::ReviewLookup => {
                "You are a travel assistant answering questions about places. Base opinions \
                 on real traveller reviews and say when reviews are scarce."
            }
            ConversationMode::TransitLookup => {
                "You are a rail travel assistant. Answer with concrete train numbers, \
                 departure and arrival times, and remaining seats."
            }
            ConversationMode::DestinationLookup => {
                "You are a destination guide. Answer with weather, sights, food and \
                 directions for the city in question."
            }
            ConversationMode::General => {
                "You are a friendly travel planning assistant. Help with trains, weather, \
                 sights, hotels and full itineraries."
            }
        }
    }
}

/// Pick the conversation mode for the next reply.
pub fn select_mode(history: &[Message], preferences: &PreferenceProfile) -> ConversationMode {
    let Some(last) = history.iter().rev().find(|m| m.role == Role::User) else {
        return ConversationMode::General;
    };
    let lower = last.content.to_lowercase();

    if talks_about_preferences(&lower) {
        ConversationMode::PreferenceElicitation
    } else if mentions_any(&lower, REVIEW_WORDS) {
        ConversationMode::ReviewLookup
    } else if mentions_any(&lower, TRANSIT_WORDS) {
        ConversationMode::TransitLookup
    } else if mentions_any(&lower, DESTINATION_WORDS) {
        ConversationMode::DestinationLookup
    } else if mentions_any(&lower, PLANNING_WORDS) {
        if preferences.has_collected_any() {
            ConversationMode::Planning
        } else {
            ConversationMode::PreferenceElicitation
        }
    } else {
        ConversationMode::General
    }
}

/// Sets the turn's mode and directive from the (possibly compacted) history.
#[derive(Debug, Default)]
pub struct DirectiveStage;

#[async_trait]
impl Middleware for DirectiveStage {
    fn name(&self) -> &str {
        "directive"
    }

    async fn before_turn(&self, ctx: &mut TurnContext) -> Result<Flow, MiddlewareError> {
        let mode = select_mode(&ctx.session.turn_history, &ctx.session.preferences);
        debug!(session_id = %ctx.session_id(), mode = mode.as_str(), "Directive selected");
        ctx.mode = mode;
        ctx.directive = Some(mode.directive().to_string());
        Ok(Flow::Continue)
    }
}
