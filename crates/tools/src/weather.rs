//! Weather forecast tool: stub that returns mock forecast data.
//!
//! In production this would call the map provider's weather endpoint.
//! The stub returns a plausible multi-day forecast so weather-aware turns can
//! be exercised end-to-end without network access.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tripclaw_core::error::ToolError;
use tripclaw_core::tool::{ParamType, Tool, ToolKind, ToolResult, ToolSchema};

use crate::stub::{opt_u64, stable_hash, str_arg};

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Geo
    }

    fn description(&self) -> &str {
        "Weather forecast for a city: conditions, high/low temperature and wind for the next few days."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("city", ParamType::String, "City name, e.g. Hangzhou")
            .optional("days", ParamType::Integer, "Forecast days, 1-4 (default 3)")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let city = str_arg(self.name(), arguments, "city")?;
        let days = opt_u64(arguments, "days").unwrap_or(3).clamp(1, 4) as usize;
        let forecast = generate_mock_forecast(city, days);
        let payload = serde_json::to_value(&forecast).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::ok(payload))
    }
}

#[derive(Serialize)]
struct Forecast {
    city: String,
    days: Vec<DayForecast>,
}

#[derive(Serialize)]
struct DayForecast {
    date: String,
    conditions: String,
    high_c: i32,
    low_c: i32,
    wind: String,
}

/// Deterministic forecast keyed by city name and day offset.
fn generate_mock_forecast(city: &str, days: usize) -> Forecast {
    let conditions_list = [
        "Sunny",
        "Partly cloudy",
        "Overcast",
        "Light rain",
        "Showers",
        "Thunderstorms",
    ];
    let wind_dirs = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let today = Utc::now().date_naive();

    let days = (0..days)
        .map(|offset| {
            let hash = stable_hash(&[city, &offset.to_string()]);
            let high = 12 + (hash % 20) as i32;
            DayForecast {
                date: (today + Duration::days(offset as i64)).to_string(),
                conditions: conditions_list[(hash as usize / 7) % conditions_list.len()].to_string(),
                high_c: high,
                low_c: high - 4 - (hash % 6) as i32,
                wind: format!(
                    "{} {}",
                    wind_dirs[(hash as usize / 3) % wind_dirs.len()],
                    1 + hash % 4
                ),
            }
        })
        .collect();

    Forecast {
        city: city.to_string(),
        days,
    }
}
