//! The five nodes of the recommendation pipeline.
//!
//! ```text
//! search_places -> fetch_reviews -> recommend_hotels -> plan_route -> synthesize_result
//! ```

pub mod fetch_reviews;
pub mod plan_route;
pub mod recommend_hotels;
pub mod search_places;
pub mod synthesize_result;

use serde_json::Value;
use tripclaw_core::error::WorkflowError;

use crate::graph::Graph;

pub use fetch_reviews::FetchReviews;
pub use plan_route::PlanRoute;
pub use recommend_hotels::RecommendHotels;
pub use search_places::SearchPlaces;
pub use synthesize_result::SynthesizeResult;

/// Id of the default recommendation graph.
pub const RECOMMENDATION_GRAPH: &str = "recommendation";

/// The linear five-stage recommendation graph.
pub fn recommendation_graph() -> Result<Graph, WorkflowError> {
    Graph::builder(RECOMMENDATION_GRAPH)
        .node(SearchPlaces)
        .node(FetchReviews)
        .node(RecommendHotels)
        .node(PlanRoute)
        .node(SynthesizeResult)
        .chain(&[
            search_places::ID,
            fetch_reviews::ID,
            recommend_hotels::ID,
            plan_route::ID,
            synthesize_result::ID,
        ])
        .build()
}

/// Names of the first `limit` places in a `search_places` payload.
pub(crate) fn place_names(payload: &Value, limit: usize) -> Vec<String> {
    payload["places"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .take(limit)
        .collect()
}
