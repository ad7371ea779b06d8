//! Map tools: geocoding, POI search and route directions.
//!
//! Stubs standing in for the map provider. Coordinates are derived from a
//! stable hash of the city and place name, so distances between the same two
//! places never change between runs. Route viability follows simple distance
//! rules: walking is refused beyond [`MAX_WALK_M`], transit below
//! [`MIN_TRANSIT_M`].

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tripclaw_core::error::ToolError;
use tripclaw_core::tool::{ParamType, Tool, ToolKind, ToolResult, ToolSchema};

use crate::stub::{coordinates, distance_m, opt_str, opt_u64, stable_hash, str_arg};

/// Longest leg the walking router accepts.
pub const MAX_WALK_M: f64 = 5_000.0;
/// Shortest leg the transit router accepts.
pub const MIN_TRANSIT_M: f64 = 800.0;

pub struct GeocodeTool;

#[async_trait]
impl Tool for GeocodeTool {
    fn name(&self) -> &str {
        "geocode"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Geo
    }

    fn description(&self) -> &str {
        "Resolve an address or landmark to longitude/latitude."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("address", ParamType::String, "Address or landmark name")
            .optional("city", ParamType::String, "City to disambiguate the address")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let address = str_arg(self.name(), arguments, "address")?;
        let city = opt_str(arguments, "city").unwrap_or(address);
        let (lng, lat) = coordinates(city, address);
        Ok(ToolResult::ok(json!({
            "address": address,
            "city": city,
            "location": { "lng": lng, "lat": lat },
        })))
    }
}

pub struct PoiSearchTool;

#[async_trait]
impl Tool for PoiSearchTool {
    fn name(&self) -> &str {
        "poi_search"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Geo
    }

    fn description(&self) -> &str {
        "Search points of interest in a city by keyword. Returns name, address, category, rating and location."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("city", ParamType::String, "City to search in")
            .required("keywords", ParamType::String, "Category keyword, e.g. museum")
            .optional("limit", ParamType::Integer, "Maximum results (default 5)")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let city = str_arg(self.name(), arguments, "city")?;
        let keywords = str_arg(self.name(), arguments, "keywords")?;
        let limit = opt_u64(arguments, "limit").unwrap_or(5).clamp(1, 10) as usize;

        let pois: Vec<Value> = poi_names(city, keywords)
            .into_iter()
            .take(limit)
            .map(|name| {
                let (lng, lat) = coordinates(city, &name);
                let hash = stable_hash(&[city, &name]);
                json!({
                    "name": name,
                    "address": format!("{} Road No.{}, {city}", title_case(keywords), 1 + hash % 300),
                    "category": keywords,
                    "rating": 3.5 + (hash % 16) as f64 / 10.0,
                    "location": { "lng": lng, "lat": lat },
                })
            })
            .collect();

        Ok(ToolResult::ok(json!({
            "city": city,
            "keywords": keywords,
            "pois": pois,
        })))
    }
}

fn poi_names(city: &str, keyword: &str) -> Vec<String> {
    let kw = title_case(keyword);
    vec![
        format!("{city} {kw}"),
        format!("Old Town {kw}"),
        format!("Riverside {kw}"),
        format!("{city} Central {kw}"),
        format!("West Gate {kw}"),
        format!("Lakeside {kw}"),
    ]
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct RouteDirectionsTool;

#[async_trait]
impl Tool for RouteDirectionsTool {
    fn name(&self) -> &str {
        "route_directions"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Geo
    }

    fn description(&self) -> &str {
        "Directions between two places by walking, public transit or driving. Returns distance, duration and steps."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("origin", ParamType::String, "Start place name")
            .required("destination", ParamType::String, "End place name")
            .required("mode", ParamType::String, "Travel mode")
            .one_of(&["walking", "transit", "driving"])
            .optional("city", ParamType::String, "City both places are in")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let origin = str_arg(self.name(), arguments, "origin")?;
        let destination = str_arg(self.name(), arguments, "destination")?;
        let mode = str_arg(self.name(), arguments, "mode")?;
        let city = opt_str(arguments, "city").unwrap_or("");

        let distance = distance_m(coordinates(city, origin), coordinates(city, destination)).round();
        let unavailable = |reason: String| ToolError::ExecutionFailed {
            tool_name: "route_directions".into(),
            reason,
        };

        let (duration_min, steps) = match mode {
            "walking" => {
                if distance > MAX_WALK_M {
                    return Err(unavailable(format!(
                        "no walking route: {distance}m exceeds {MAX_WALK_M}m"
                    )));
                }
                (
                    (distance / 80.0).ceil(),
                    vec![format!("Walk {distance}m from {origin} to {destination}")],
                )
            }
            "transit" => {
                if distance < MIN_TRANSIT_M {
                    return Err(unavailable(format!(
                        "no transit route: {distance}m is walking distance"
                    )));
                }
                let line = 1 + stable_hash(&[city, origin, destination]) % 16;
                (
                    (distance / 400.0).ceil() + 8.0,
                    vec![
                        format!("Walk to the nearest Metro Line {line} station"),
                        format!("Ride Metro Line {line} towards {destination}"),
                        format!("Walk to {destination}"),
                    ],
                )
            }
            _ => (
                (distance / 500.0).ceil() + 5.0,
                vec![format!("Drive {distance}m from {origin} to {destination}")],
            ),
        };

        Ok(ToolResult::ok(json!({
            "origin": origin,
            "destination": destination,
            "mode": mode,
            "distance_m": distance,
            "duration_min": duration_min,
            "steps": steps,
        })))
    }
}
