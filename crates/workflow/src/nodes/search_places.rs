//! Node 1: find candidate places from the traveller's interests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::debug;
use tripclaw_core::checkpoint::NodeOutput;
use tripclaw_core::error::NodeError;
use tripclaw_core::preference::{Interest, PreferenceProfile};

use crate::fanout::fan_out;
use crate::node::{Node, NodeContext};

pub const ID: &str = "search_places";

const MAX_KEYWORDS: usize = 3;
const PLACES_PER_KEYWORD: usize = 3;

pub struct SearchPlaces;

/// POI search keywords for one interest.
pub fn interest_keywords(interest: Interest) -> &'static [&'static str] {
    match interest {
        Interest::History => &["museum", "historic site", "cultural street"],
        Interest::Nature => &["park", "scenic area"],
        Interest::Food => &["local food", "restaurant"],
        Interest::Shopping => &["mall", "shopping street"],
        Interest::Family => &["amusement park", "zoo"],
        Interest::Art => &["art museum", "theatre"],
    }
}

/// Up to three distinct keywords, taken round-robin across interests so
/// that every interest is represented before any gets a second keyword.
pub fn keywords_for(preferences: &PreferenceProfile) -> Vec<&'static str> {
    if preferences.interests.is_empty() {
        return vec!["attractions", "local food"];
    }
    let lists: Vec<&[&str]> = preferences
        .interests
        .iter()
        .map(|i| interest_keywords(*i))
        .collect();
    let depth = lists.iter().map(|l| l.len()).max().unwrap_or(0);

    let mut keywords = Vec::new();
    for round in 0..depth {
        for list in &lists {
            if let Some(kw) = list.get(round) {
                if !keywords.contains(kw) {
                    keywords.push(*kw);
                }
            }
        }
    }
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

#[async_trait]
impl Node for SearchPlaces {
    fn id(&self) -> &str {
        ID
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let keywords = keywords_for(&ctx.preferences);
        let city = ctx.city();

        let calls: Vec<_> = keywords
            .iter()
            .map(|kw| {
                let args = json!({ "city": city, "keywords": kw, "limit": PLACES_PER_KEYWORD });
                (kw.to_string(), ctx.call_tool_ok("poi_search", args))
            })
            .collect();
        let (found, failures) = fan_out(ctx.max_fan_out, calls).await.require_any()?;

        let mut seen = HashSet::new();
        let mut places: Vec<Value> = Vec::new();
        for (keyword, payload) in found {
            let pois = payload["pois"].as_array().cloned().unwrap_or_default();
            for mut poi in pois.into_iter().take(PLACES_PER_KEYWORD) {
                let Some(name) = poi["name"].as_str().map(str::to_string) else {
                    continue;
                };
                if seen.insert(name) {
                    poi["keyword"] = json!(keyword);
                    places.push(poi);
                }
            }
        }

        debug!(city, places = places.len(), failed = failures.len(), "Places collected");
        Ok(NodeOutput::new(json!({ "keywords": keywords, "places": places })).with_failures(failures))
    }
}
