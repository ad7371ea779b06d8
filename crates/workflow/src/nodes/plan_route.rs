//! Node 4: legs between consecutive places in the traveller's preferred mode.
//!
//! Each leg the requested mode cannot serve is retried with mixed routing
//! (transit, then walking) and the output is marked degraded. When no leg
//! works in the requested mode the whole route is reported as mixed.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use tripclaw_core::checkpoint::{ItemFailure, NodeOutput};
use tripclaw_core::error::NodeError;
use tripclaw_core::preference::TravelMode;

use crate::fanout::fan_out;
use crate::node::{Node, NodeContext};
use crate::nodes::{place_names, search_places};

pub const ID: &str = "plan_route";

const MAX_PLACES: usize = 5;
const MIXED_ORDER: [&str; 2] = ["transit", "walking"];

pub struct PlanRoute;

/// Router mode for a single-mode preference; `None` for mixed.
pub fn router_mode(mode: TravelMode) -> Option<&'static str> {
    match mode {
        TravelMode::Walk => Some("walking"),
        TravelMode::Transit => Some("transit"),
        TravelMode::Drive => Some("driving"),
        TravelMode::Mixed => None,
    }
}

type Legs = (Vec<(String, Value)>, Vec<ItemFailure>);

fn leg_label(from: &str, to: &str) -> String {
    format!("{from} -> {to}")
}

impl PlanRoute {
    async fn legs_in_mode(ctx: &NodeContext, pairs: &[(String, String)], mode: &str) -> Legs {
        let calls: Vec<_> = pairs
            .iter()
            .map(|(from, to)| {
                let args = json!({
                    "origin": from,
                    "destination": to,
                    "mode": mode,
                    "city": ctx.city(),
                });
                (leg_label(from, to), ctx.call_tool_ok("route_directions", args))
            })
            .collect();
        fan_out(ctx.max_fan_out, calls).await.partition()
    }

    async fn legs_mixed(ctx: &NodeContext, pairs: &[(String, String)]) -> Legs {
        let calls: Vec<_> = pairs
            .iter()
            .map(|(from, to)| {
                let leg = async move {
                    let mut errors = Vec::new();
                    for mode in MIXED_ORDER {
                        let args = json!({
                            "origin": from,
                            "destination": to,
                            "mode": mode,
                            "city": ctx.city(),
                        });
                        match ctx.call_tool_ok("route_directions", args).await {
                            Ok(payload) => return Ok(payload),
                            Err(e) => errors.push(format!("{mode}: {e}")),
                        }
                    }
                    Err(errors.join("; "))
                };
                (leg_label(from, to), leg)
            })
            .collect();
        fan_out(ctx.max_fan_out, calls).await.partition()
    }
}

fn leg_json(label: &str, payload: &Value) -> Value {
    json!({
        "leg": label,
        "from": payload["origin"],
        "to": payload["destination"],
        "mode": payload["mode"],
        "distance_m": payload["distance_m"],
        "duration_min": payload["duration_min"],
    })
}

#[async_trait]
impl Node for PlanRoute {
    fn id(&self) -> &str {
        ID
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let places = place_names(ctx.state.require_payload(search_places::ID)?, MAX_PLACES);
        let requested = ctx.preferences.travel_mode;

        if places.len() < 2 {
            return Ok(NodeOutput::new(json!({
                "mode": requested.as_str(),
                "legs": [],
                "note": "fewer than two places; no route needed",
            })));
        }

        let pairs: Vec<(String, String)> = places
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();

        let mut degraded = None;
        let (legs, failures, mode_used) = match router_mode(requested) {
            Some(mode) => {
                let (direct, missed) = Self::legs_in_mode(ctx, &pairs, mode).await;
                if missed.is_empty() {
                    (direct, missed, requested)
                } else {
                    let retry: Vec<(String, String)> = pairs
                        .iter()
                        .filter(|(from, to)| missed.iter().any(|m| m.item == leg_label(from, to)))
                        .cloned()
                        .collect();
                    warn!(mode, legs = retry.len(), "No route in requested mode for some legs, using mixed routing");
                    let (rerouted, still_missing) = Self::legs_mixed(ctx, &retry).await;

                    if !rerouted.is_empty() {
                        degraded = Some(if direct.is_empty() {
                            format!("no {mode} route for any leg; used mixed routing")
                        } else {
                            format!(
                                "no {mode} route for {} of {} legs; used mixed routing for those",
                                rerouted.len(),
                                pairs.len()
                            )
                        });
                    }
                    let mode_used = if direct.is_empty() { TravelMode::Mixed } else { requested };

                    let failures = still_missing
                        .into_iter()
                        .map(|f| {
                            let first = missed.iter().find(|m| m.item == f.item).map(|m| m.detail.as_str());
                            ItemFailure {
                                detail: format!("{mode}: {}; {}", first.unwrap_or("failed"), f.detail),
                                item: f.item,
                            }
                        })
                        .collect();

                    // Back into travel order.
                    let mut legs = direct;
                    legs.extend(rerouted);
                    legs.sort_by_key(|(label, _)| {
                        pairs.iter().position(|(from, to)| leg_label(from, to) == *label)
                    });
                    (legs, failures, mode_used)
                }
            }
            None => {
                let (legs, failures) = Self::legs_mixed(ctx, &pairs).await;
                (legs, failures, TravelMode::Mixed)
            }
        };

        if legs.is_empty() {
            let detail = failures
                .iter()
                .map(|f| format!("{}: {}", f.item, f.detail))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(NodeError::AllItemsFailed {
                attempted: pairs.len(),
                detail,
            });
        }

        let legs: Vec<Value> = legs.iter().map(|(label, p)| leg_json(label, p)).collect();
        debug!(mode = mode_used.as_str(), legs = legs.len(), "Route planned");

        let output = NodeOutput::new(json!({
            "mode": mode_used.as_str(),
            "legs": legs,
        }))
        .with_failures(failures);
        Ok(match degraded {
            Some(reason) => output.degraded(reason),
            None => output,
        })
    }
}
