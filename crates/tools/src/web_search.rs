//! Web search tool: stub that returns mock search results.
//!
//! In production this would call a real search API. The stub returns
//! plausible traveller reviews and guide pages so the review node can be
//! tested end-to-end without network access, including the guide-style pages
//! it is expected to filter out.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tripclaw_core::error::ToolError;
use tripclaw_core::tool::{ParamType, Tool, ToolKind, ToolResult, ToolSchema};

use crate::stub::{opt_u64, stable_hash, str_arg};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn description(&self) -> &str {
        "Search the web for reviews and travel information. Returns titles, URLs, and snippets."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("query", ParamType::String, "The search query")
            .optional("num_results", ParamType::Integer, "Number of results (default 3, max 5)")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let query = str_arg(self.name(), arguments, "query")?;
        let num_results = opt_u64(arguments, "num_results").unwrap_or(3).clamp(1, 5) as usize;

        let results = generate_mock_results(query, num_results);
        Ok(ToolResult::ok(serde_json::json!({
            "query": query,
            "results": results,
        })))
    }
}

#[derive(Clone, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

fn generate_mock_results(query: &str, count: usize) -> Vec<SearchResult> {
    let q = query.to_lowercase();
    let subject = query
        .trim_end_matches(" reviews")
        .trim_end_matches(" review")
        .trim();

    if q.contains("review") || q.contains("评价") {
        let opinions = [
            "Worth the visit; go early on weekdays to avoid the crowds.",
            "Beautiful at dusk, but the queue for tickets took almost an hour.",
            "Staff were friendly and the signage is available in English.",
            "A bit overpriced, though the views make up for it.",
            "Easy to reach by metro and fine for kids and older travellers.",
        ];
        let hash = stable_hash(&[subject]) as usize;
        // One guide-style page mixed in, as real review searches return them.
        let mut results: Vec<SearchResult> = (0..count.saturating_sub(1))
            .map(|i| SearchResult {
                title: format!("{subject} - traveller review #{}", i + 1),
                url: format!("https://reviews.example.com/{}/{}", urlencode(subject), i + 1),
                snippet: opinions[(hash + i) % opinions.len()].to_string(),
            })
            .collect();
        results.push(SearchResult {
            title: format!("{subject}: 3-day itinerary guide"),
            url: format!("https://guides.example.com/{}", urlencode(subject)),
            snippet: "Day 1: arrive and check in. Day 2: full itinerary of the old town.".into(),
        });
        return results;
    }

    // Generic fallback.
    (0..count)
        .map(|i| SearchResult {
            title: format!("Result {} for: {}", i + 1, query),
            url: format!("https://example.com/search?q={}&p={}", urlencode(query), i + 1),
            snippet: format!("Travel information about '{query}'."),
        })
        .collect()
}

fn urlencode(s: &str) -> String {
    s.replace(' ', "+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn review_search_mixes_in_a_guide() {
        let result = WebSearchTool
            .invoke(&args(json!({"query": "Shanghai The Bund reviews"})))
            .await
            .unwrap();
        let results = result.payload["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().any(|r| r["snippet"].as_str().unwrap().contains("Day 1")));
    }

    #[tokio::test]
    async fn search_respects_num_results() {
        let result = WebSearchTool
            .invoke(&args(json!({"query": "high speed rail tips", "num_results": 2})))
            .await
            .unwrap();
        assert_eq!(result.payload["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let result = WebSearchTool.invoke(&Map::new()).await;
        assert!(result.is_err());
    }

    #[test]
    fn schema_requires_query() {
        let schema = WebSearchTool.schema();
        assert!(schema.validate(&Map::new()).is_err());
        assert!(schema.validate(&args(json!({"query": "x"}))).is_ok());
    }
}
