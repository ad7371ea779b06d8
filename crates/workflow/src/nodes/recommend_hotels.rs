//! Node 3: hotels inside the traveller's budget band.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;
use tripclaw_core::checkpoint::NodeOutput;
use tripclaw_core::error::NodeError;

use crate::node::{Node, NodeContext};

pub const ID: &str = "recommend_hotels";

const MAX_HOTELS: usize = 5;

pub struct RecommendHotels;

#[async_trait]
impl Node for RecommendHotels {
    fn id(&self) -> &str {
        ID
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let budget = ctx.preferences.budget;
        let stars = budget.star_band();
        let prices = budget.price_band();
        let tags = &ctx.preferences.lodging_pref;

        let mut args = json!({
            "place": ctx.city(),
            "star_min": stars.min,
            "star_max": stars.max,
            "size": 10,
        });
        if !tags.is_empty() {
            args["keywords"] = json!(tags);
        }

        let result = ctx.call_tool("hotel_search", args).await;
        if !result.is_success() {
            return Err(NodeError::Tool {
                tool_name: "hotel_search".into(),
                detail: result.error_detail.unwrap_or_default(),
            });
        }

        let mut hotels: Vec<Value> = result.payload["hotels"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|h| h["stars"].as_f64().is_some_and(|s| stars.contains(s)))
            .filter(|h| h["price"].as_f64().is_none_or(|p| prices.contains(p)))
            .collect();

        if tags.iter().any(|t| t == "value") {
            hotels.sort_by(|a, b| {
                let pa = a["price"].as_f64().unwrap_or(f64::MAX);
                let pb = b["price"].as_f64().unwrap_or(f64::MAX);
                pa.total_cmp(&pb)
            });
        }
        hotels.truncate(MAX_HOTELS);

        debug!(budget = budget.as_str(), hotels = hotels.len(), "Hotels selected");
        Ok(NodeOutput::new(json!({
            "budget": budget.as_str(),
            "star_band": { "min": stars.min, "max": stars.max },
            "hotels": hotels,
        })))
    }
}
