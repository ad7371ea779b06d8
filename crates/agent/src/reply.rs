//! Plain-text rendering of tool results and workflow outcomes.

use std::fmt::Write as _;

use serde_json::Value;
use tripclaw_core::checkpoint::{CheckpointStatus, WorkflowCheckpoint};
use tripclaw_core::tool::{ToolInvocation, ToolResult};

const SUMMARY_NODE: &str = "synthesize_result";
const MAX_LISTED: usize = 5;

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("?")
}

fn items<'a>(payload: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    payload[key].as_array().into_iter().flatten().take(MAX_LISTED)
}

pub fn render_tool_result(invocation: &ToolInvocation, result: &ToolResult) -> String {
    let name = invocation.tool_name.as_str();
    if !result.is_success() {
        return format!(
            "The {name} lookup failed: {}",
            result.error_detail.as_deref().unwrap_or("unknown error")
        );
    }

    let payload = &result.payload;
    let mut out = String::new();
    match name {
        "weather" => {
            let _ = writeln!(out, "Weather for {}:", text(payload, "city"));
            for day in items(payload, "days") {
                let _ = writeln!(
                    out,
                    "- {}: {}, {}-{}°C, {}",
                    text(day, "date"),
                    text(day, "conditions"),
                    day["low_c"],
                    day["high_c"],
                    text(day, "wind"),
                );
            }
        }
        "train_tickets" => {
            let _ = writeln!(out, "Trains on {}:", text(payload, "date"));
            for train in items(payload, "trains") {
                let _ = writeln!(
                    out,
                    "- {} {} {} -> {} {} (second class seats: {})",
                    text(train, "train_code"),
                    text(train, "from_station"),
                    text(train, "depart"),
                    text(train, "to_station"),
                    text(train, "arrive"),
                    train["seats"]["second"],
                );
            }
        }
        "train_stations" => {
            let _ = writeln!(out, "Stops for {} on {}:", text(payload, "train_code"), text(payload, "depart_date"));
            for stop in payload["stations"].as_array().into_iter().flatten() {
                let _ = writeln!(
                    out,
                    "- {} arr {} dep {}",
                    text(stop, "station"),
                    stop["arrive"].as_str().unwrap_or("--"),
                    stop["depart"].as_str().unwrap_or("--"),
                );
            }
        }
        "web_search" => {
            let _ = writeln!(out, "What travellers say about \"{}\":", text(payload, "query"));
            for hit in items(payload, "results") {
                let _ = writeln!(out, "- {}: {}", text(hit, "title"), text(hit, "snippet"));
            }
        }
        "poi_search" => {
            let _ = writeln!(out, "{} in {}:", text(payload, "keywords"), text(payload, "city"));
            for poi in items(payload, "pois") {
                let _ = writeln!(out, "- {} ({}), rated {}", text(poi, "name"), text(poi, "address"), poi["rating"]);
            }
        }
        _ => {
            let _ = writeln!(out, "{name}: {payload}");
        }
    }
    if let Some(detail) = &result.error_detail {
        let _ = writeln!(out, "(partial: {detail})");
    }
    out.trim_end().to_string()
}

/// Reply for a workflow run that returned this checkpoint.
pub fn render_checkpoint(checkpoint: &WorkflowCheckpoint) -> String {
    match checkpoint.status {
        CheckpointStatus::Completed => checkpoint
            .output(SUMMARY_NODE)
            .and_then(|o| o.payload["summary"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "The plan finished but produced no summary.".to_string()),
        CheckpointStatus::Failed => {
            let (node, detail) = checkpoint
                .error
                .as_ref()
                .map(|e| (e.node.as_str(), e.detail.as_str()))
                .unwrap_or((checkpoint.current_node.as_str(), "unknown error"));
            format!(
                "Planning stopped at step '{node}': {detail}. Steps already finished are saved; reply 'retry' to resume from that step."
            )
        }
        CheckpointStatus::Suspended | CheckpointStatus::Running => format!(
            "Planning paused before step '{}'. Reply 'continue' to pick it up again.",
            checkpoint.current_node
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tripclaw_core::checkpoint::{CheckpointError, NodeOutput, WorkflowInput};
    use tripclaw_core::error::NodeError;

    #[test]
    fn weather_lines() {
        let inv = ToolInvocation::new("weather", json!({"city": "Hangzhou"}));
        let result = ToolResult::ok(json!({
            "city": "Hangzhou",
            "days": [{"date": "2026-04-01", "conditions": "Sunny", "high_c": 22, "low_c": 12, "wind": "NE 2"}]
        }));
        assert_eq!(
            render_tool_result(&inv, &result),
            "Weather for Hangzhou:\n- 2026-04-01: Sunny, 12-22°C, NE 2"
        );
    }

    #[test]
    fn errors_are_explained() {
        let inv = ToolInvocation::new("train_tickets", json!({}));
        let text = render_tool_result(&inv, &ToolResult::error("no route"));
        assert_eq!(text, "The train_tickets lookup failed: no route");
    }

    #[test]
    fn failed_checkpoint_offers_retry() {
        let mut cp = WorkflowCheckpoint::start("recommendation", "fetch_reviews", WorkflowInput::new("Shanghai"));
        cp.status = CheckpointStatus::Failed;
        cp.error = Some(CheckpointError::from_node(
            "fetch_reviews",
            &NodeError::Timeout { deadline_ms: 30000 },
        ));
        let text = render_checkpoint(&cp);
        assert!(text.contains("fetch_reviews"));
        assert!(text.contains("'retry'"));
    }

    #[test]
    fn completed_checkpoint_returns_summary() {
        let mut cp = WorkflowCheckpoint::start("recommendation", SUMMARY_NODE, WorkflowInput::new("Shanghai"));
        cp.node_outputs
            .insert(SUMMARY_NODE.into(), NodeOutput::new(json!({"summary": "# Shanghai travel plan"})));
        cp.status = CheckpointStatus::Completed;
        assert_eq!(render_checkpoint(&cp), "# Shanghai travel plan");
    }
}
