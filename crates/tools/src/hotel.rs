//! Hotel search tool: stub over a generated hotel inventory.
//!
//! Callers pass a star band (budgets map onto one) and optional lodging tags.
//! The stub always returns a spread of star ratings and prices around the
//! place; the star band is applied here, price filtering is left to callers.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tripclaw_core::error::ToolError;
use tripclaw_core::tool::{ParamType, Tool, ToolKind, ToolResult, ToolSchema};

use crate::stub::{opt_f64, opt_u64, stable_hash, str_arg};

const TAGS: [&str; 4] = ["quiet", "near_attractions", "transit_access", "value"];

pub struct HotelSearchTool;

#[async_trait]
impl Tool for HotelSearchTool {
    fn name(&self) -> &str {
        "hotel_search"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Hotel
    }

    fn description(&self) -> &str {
        "Search hotels near a city, landmark or station, filtered by star rating and lodging tags."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("place", ParamType::String, "City, landmark or station")
            .optional("star_min", ParamType::Number, "Lowest star rating, 0.0-5.0")
            .optional("star_max", ParamType::Number, "Highest star rating, 0.0-5.0")
            .optional("keywords", ParamType::Array, "Lodging tags, e.g. [\"quiet\"]")
            .optional("size", ParamType::Integer, "Maximum results (default 10, max 20)")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let place = str_arg(self.name(), arguments, "place")?;
        let star_min = opt_f64(arguments, "star_min").unwrap_or(0.0);
        let star_max = opt_f64(arguments, "star_max").unwrap_or(5.0);
        if star_min > star_max {
            return Err(ToolError::Validation {
                tool_name: self.name().into(),
                reason: format!("star_min {star_min} is above star_max {star_max}"),
            });
        }
        let size = opt_u64(arguments, "size").unwrap_or(10).clamp(1, 20) as usize;
        let keywords: Vec<&str> = arguments
            .get("keywords")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let hotels: Vec<Hotel> = inventory(place)
            .into_iter()
            .filter(|h| h.stars >= star_min && h.stars <= star_max)
            .filter(|h| keywords.iter().all(|k| !TAGS.contains(k) || h.tags.iter().any(|t| t == k)))
            .take(size)
            .collect();

        let payload = serde_json::to_value(&hotels).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::ok(serde_json::json!({
            "place": place,
            "hotels": payload,
        })))
    }
}

#[derive(Serialize)]
struct Hotel {
    name: String,
    stars: f64,
    price: f64,
    address: String,
    tags: Vec<String>,
}

/// Twelve hotels per place, stars 2.0 to 5.0 in half steps.
fn inventory(place: &str) -> Vec<Hotel> {
    let brands = ["Jinjiang Inn", "Atour", "Hanting", "Crowne Plaza", "Hilton", "Mandarin Oriental"];
    (0..12)
        .map(|i| {
            let hash = stable_hash(&[place, &i.to_string()]);
            let stars = 2.0 + (i % 7) as f64 * 0.5;
            let price = (stars * stars * 60.0 + (hash % 150) as f64).round();
            let tags = TAGS
                .iter()
                .enumerate()
                .filter(|(t, _)| (hash >> *t) & 1 == 1)
                .map(|(_, tag)| tag.to_string())
                .collect();
            Hotel {
                name: format!("{} {place} #{}", brands[i % brands.len()], i + 1),
                stars,
                price,
                address: format!("{} Avenue No.{}, {place}", ["North", "South", "East", "West"][i % 4], 1 + hash % 500),
                tags,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn star_band_is_applied() {
        let result = HotelSearchTool
            .invoke(&args(json!({"place": "Shanghai", "star_min": 3.0, "star_max": 4.5})))
            .await
            .unwrap();
        let hotels = result.payload["hotels"].as_array().unwrap();
        assert!(!hotels.is_empty());
        for h in hotels {
            let stars = h["stars"].as_f64().unwrap();
            assert!((3.0..=4.5).contains(&stars), "{stars}");
        }
    }

    #[tokio::test]
    async fn inverted_band_is_rejected() {
        let err = HotelSearchTool
            .invoke(&args(json!({"place": "Shanghai", "star_min": 5.0, "star_max": 3.0})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[tokio::test]
    async fn tag_keywords_filter() {
        let result = HotelSearchTool
            .invoke(&args(json!({"place": "Hangzhou", "keywords": ["quiet"]})))
            .await
            .unwrap();
        for h in result.payload["hotels"].as_array().unwrap() {
            assert!(h["tags"].as_array().unwrap().iter().any(|t| t == "quiet"));
        }
    }

    #[tokio::test]
    async fn size_caps_results() {
        let result = HotelSearchTool
            .invoke(&args(json!({"place": "Beijing", "size": 2})))
            .await
            .unwrap();
        assert_eq!(result.payload["hotels"].as_array().unwrap().len(), 2);
    }
}
