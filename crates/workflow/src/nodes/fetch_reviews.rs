//! Node 2: traveller reviews for the top places.

use async_trait::async_trait;
use serde_json::{Value, json};
use tripclaw_core::checkpoint::NodeOutput;
use tripclaw_core::error::NodeError;

use crate::fanout::fan_out;
use crate::node::{Node, NodeContext};
use crate::nodes::{place_names, search_places};

pub const ID: &str = "fetch_reviews";

const MAX_PLACES: usize = 5;

/// Markers of itinerary/guide pages rather than reviews.
const GUIDE_MARKERS: [&str; 10] = [
    "itinerary",
    "day 1",
    "day1",
    "day 2",
    "day2",
    "攻略",
    "行程安排",
    "路线规划",
    "第一天",
    "第二天",
];

pub struct FetchReviews;

pub fn is_guide_like(text: &str) -> bool {
    let lower = text.to_lowercase();
    GUIDE_MARKERS.iter().any(|m| lower.contains(m))
}

#[async_trait]
impl Node for FetchReviews {
    fn id(&self) -> &str {
        ID
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let places = place_names(ctx.state.require_payload(search_places::ID)?, MAX_PLACES);
        if places.is_empty() {
            return Ok(NodeOutput::new(json!({ "reviews": [] })));
        }

        let city = ctx.city();
        let calls: Vec<_> = places
            .iter()
            .map(|place| {
                let args = json!({ "query": format!("{city} {place} reviews"), "num_results": 3 });
                (place.clone(), ctx.call_tool_ok("web_search", args))
            })
            .collect();
        let (found, failures) = fan_out(ctx.max_fan_out, calls).await.require_any()?;

        let reviews: Vec<Value> = found
            .into_iter()
            .map(|(place, payload)| {
                let excerpts: Vec<String> = payload["results"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter(|r| {
                        let title = r["title"].as_str().unwrap_or_default();
                        let snippet = r["snippet"].as_str().unwrap_or_default();
                        !is_guide_like(title) && !is_guide_like(snippet)
                    })
                    .filter_map(|r| r["snippet"].as_str().map(str::to_string))
                    .collect();
                json!({ "place": place, "excerpts": excerpts })
            })
            .collect();

        Ok(NodeOutput::new(json!({ "reviews": reviews })).with_failures(failures))
    }
}
