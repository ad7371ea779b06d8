//! Node 5: assemble the itinerary and the markdown recommendation.
//!
//! Pure: reads upstream outputs and preferences, calls no tools.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::fmt::Write as _;
use tripclaw_core::checkpoint::{MAX_TRIP_DAYS, NodeOutput};
use tripclaw_core::error::NodeError;
use tripclaw_core::preference::{Budget, Pace, PreferenceProfile, WeatherSensitivity};

use crate::node::{Node, NodeContext};
use crate::nodes::{fetch_reviews, plan_route, recommend_hotels, search_places};

pub const ID: &str = "synthesize_result";

const EXCERPT_CHARS: usize = 150;

pub struct SynthesizeResult;

/// Split places into `days` days (at most `MAX_TRIP_DAYS`) of at most
/// `pace.stops_per_day()` stops.
pub fn itinerary(places: &[String], days: u32, pace: Pace) -> Vec<Vec<String>> {
    let per_day = pace.stops_per_day();
    (0..days.min(MAX_TRIP_DAYS) as usize)
        .map(|day| places.iter().skip(day * per_day).take(per_day).cloned().collect())
        .collect()
}

pub fn tips(preferences: &PreferenceProfile) -> Vec<String> {
    let mut tips = Vec::new();
    match preferences.budget {
        Budget::Economy => tips.push("Favour free or low-cost sights and keep an eye on dining spend.".to_string()),
        Budget::Comfort => tips.push("Book hotels a few days ahead for better comfort-range rates.".to_string()),
        Budget::Luxury => tips.push("Reserve high-end restaurants early; premium hotels fill up on weekends.".to_string()),
    }
    match preferences.pace {
        Pace::Relaxed => tips.push("Plan 2-3 spots per day and leave plenty of time to rest.".to_string()),
        Pace::Moderate => tips.push("3-4 spots per day keeps the schedule comfortable.".to_string()),
        Pace::Packed => tips.push("Start early; a packed day fits more spots if tickets are booked in advance.".to_string()),
    }
    if preferences.weather_sensitivity == WeatherSensitivity::High {
        tips.push("Check the forecast each morning and keep an indoor backup.".to_string());
    }
    if !preferences.special_needs.is_empty() {
        tips.push(format!(
            "Confirm accessibility ahead of time: {}.",
            preferences.special_needs.join(", ")
        ));
    }
    tips.push("Check opening hours before you go to avoid a wasted trip.".to_string());
    tips
}

fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_CHARS {
        let cut: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn render(city: &str, places: &[Value], reviews: &Value, hotels: &Value, route: &Value, days: &[Vec<String>], tips: &[String]) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {city} travel plan\n");

    let legs = route["legs"].as_array().cloned().unwrap_or_default();
    if !legs.is_empty() {
        let _ = writeln!(md, "## Route ({})\n", route["mode"].as_str().unwrap_or("mixed"));
        for leg in &legs {
            let _ = writeln!(
                md,
                "- {} -> {}: {} ({} m, ~{} min)",
                leg["from"].as_str().unwrap_or("?"),
                leg["to"].as_str().unwrap_or("?"),
                leg["mode"].as_str().unwrap_or("?"),
                leg["distance_m"],
                leg["duration_min"],
            );
        }
        md.push('\n');
    }

    let hotel_list = hotels["hotels"].as_array().cloned().unwrap_or_default();
    if !hotel_list.is_empty() {
        let _ = writeln!(md, "## Hotels ({})\n", hotels["budget"].as_str().unwrap_or("comfort"));
        for hotel in &hotel_list {
            let _ = writeln!(
                md,
                "- {} ({} stars, ~{} CNY/night)",
                hotel["name"].as_str().unwrap_or("?"),
                hotel["stars"],
                hotel["price"],
            );
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Itinerary\n");
    for (i, stops) in days.iter().enumerate() {
        let stops = if stops.is_empty() {
            "free time".to_string()
        } else {
            stops.join(" -> ")
        };
        let _ = writeln!(md, "- Day {}: {stops}", i + 1);
    }
    md.push('\n');

    let _ = writeln!(md, "## Places\n");
    let review_list = reviews["reviews"].as_array().cloned().unwrap_or_default();
    for (i, place) in places.iter().enumerate() {
        let name = place["name"].as_str().unwrap_or("?");
        let _ = writeln!(md, "### {}. {name}", i + 1);
        if let Some(address) = place["address"].as_str() {
            let _ = writeln!(md, "Address: {address}");
        }
        let first_excerpt = review_list
            .iter()
            .find(|r| r["place"].as_str() == Some(name))
            .and_then(|r| r["excerpts"].as_array())
            .and_then(|e| e.first())
            .and_then(Value::as_str);
        if let Some(text) = first_excerpt {
            let _ = writeln!(md, "Review: {}", excerpt(text));
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Tips\n");
    for tip in tips {
        let _ = writeln!(md, "- {tip}");
    }
    md
}

#[async_trait]
impl Node for SynthesizeResult {
    fn id(&self) -> &str {
        ID
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError> {
        let state = &ctx.state;
        let places_payload = state.require_payload(search_places::ID)?;
        let reviews = state.require_payload(fetch_reviews::ID)?;
        let hotels = state.require_payload(recommend_hotels::ID)?;
        let route = state.require_payload(plan_route::ID)?;

        let places = places_payload["places"].as_array().cloned().unwrap_or_default();
        let names: Vec<String> = places
            .iter()
            .filter_map(|p| p["name"].as_str().map(str::to_string))
            .collect();
        let days = itinerary(&names, state.input.days, ctx.preferences.pace);
        let tips = tips(&ctx.preferences);
        let summary = render(ctx.city(), &places, reviews, hotels, route, &days, &tips);

        let itinerary: Vec<Value> = days
            .iter()
            .enumerate()
            .map(|(i, stops)| json!({ "day": i + 1, "stops": stops }))
            .collect();

        Ok(NodeOutput::new(json!({
            "city": ctx.city(),
            "itinerary": itinerary,
            "tips": tips,
            "summary": summary,
        })))
    }
}
