//! Rail tools: city-to-city tickets and per-train stop lists.
//!
//! Stubs standing in for the national rail ticketing service. Timetables are
//! generated from a stable hash of the route and date.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Map, Value, json};
use tripclaw_core::error::ToolError;
use tripclaw_core::tool::{ParamType, Tool, ToolKind, ToolResult, ToolSchema};

use crate::stub::{opt_str, opt_u64, stable_hash, str_arg};

pub struct TrainTicketsTool;

#[async_trait]
impl Tool for TrainTicketsTool {
    fn name(&self) -> &str {
        "train_tickets"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Transit
    }

    fn description(&self) -> &str {
        "Remaining train tickets between two cities on a date (high-speed G trains by default)."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("from_city", ParamType::String, "Departure city")
            .required("to_city", ParamType::String, "Arrival city")
            .optional("date", ParamType::String, "Travel date, yyyy-MM-dd")
            .optional("days_after_today", ParamType::Integer, "Used when date is absent (default 1)")
            .optional("train_filter", ParamType::String, "Train class prefixes, e.g. G or GD; empty for all")
            .optional("limit", ParamType::Integer, "Maximum trains (default 5)")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let from = str_arg(self.name(), arguments, "from_city")?;
        let to = str_arg(self.name(), arguments, "to_city")?;
        if from == to {
            return Err(ToolError::Validation {
                tool_name: self.name().into(),
                reason: "departure and arrival city are the same".into(),
            });
        }
        let date = travel_date(self.name(), arguments)?;
        let filter = opt_str(arguments, "train_filter").unwrap_or("G");
        let limit = opt_u64(arguments, "limit").unwrap_or(5).clamp(1, 20) as usize;

        let date_str = date.to_string();
        let base = stable_hash(&[from, to]);
        let trains: Vec<Value> = (0..12u32)
            .map(|i| {
                let hash = stable_hash(&[from, to, &date_str, &i.to_string()]);
                let class = ["G", "D", "K"][(hash % 3) as usize];
                let depart_min = 6 * 60 + i * 75 + hash % 30;
                let duration_min = 90 + base % 240 + if class == "G" { 0 } else { 120 };
                json!({
                    "train_code": format!("{class}{}", 100 + hash % 9000),
                    "from_station": format!("{from} Station"),
                    "to_station": format!("{to} Station"),
                    "depart": clock(depart_min),
                    "arrive": clock(depart_min + duration_min),
                    "duration_min": duration_min,
                    "seats": {
                        "business": hash % 8,
                        "first": hash % 40,
                        "second": 20 + hash % 300,
                    },
                })
            })
            .filter(|t| {
                filter.is_empty()
                    || t["train_code"]
                        .as_str()
                        .is_some_and(|code| filter.chars().any(|c| code.starts_with(c)))
            })
            .take(limit)
            .collect();

        let status = if trains.is_empty() {
            ToolResult::partial(
                json!({"date": date_str, "trains": []}),
                format!("no '{filter}' trains between {from} and {to}"),
            )
        } else {
            ToolResult::ok(json!({"date": date_str, "trains": trains}))
        };
        Ok(status)
    }
}

pub struct TrainStationsTool;

#[async_trait]
impl Tool for TrainStationsTool {
    fn name(&self) -> &str {
        "train_stations"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Transit
    }

    fn description(&self) -> &str {
        "Stops of one train on a date, with arrival/departure times and dwell time."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("train_code", ParamType::String, "Train number, e.g. G1033")
            .required("depart_date", ParamType::String, "Departure date, yyyy-MM-dd")
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let code = str_arg(self.name(), arguments, "train_code")?;
        let date = str_arg(self.name(), arguments, "depart_date")?;
        parse_date(self.name(), date)?;

        let hash = stable_hash(&[code]);
        let stops = 3 + (hash % 5) as usize;
        let mut minute = 7 * 60 + hash % 120;
        let stations: Vec<Value> = (0..stops)
            .map(|i| {
                let dwell = if i == 0 || i + 1 == stops { 0 } else { 2 + hash % 4 };
                let stop = json!({
                    "seq": i + 1,
                    "station": format!("Stop {} ({code})", i + 1),
                    "arrive": if i == 0 { Value::Null } else { json!(clock(minute)) },
                    "depart": if i + 1 == stops { Value::Null } else { json!(clock(minute + dwell)) },
                    "dwell_min": dwell,
                });
                minute += dwell + 35 + (stable_hash(&[code, &i.to_string()]) % 40);
                stop
            })
            .collect();

        Ok(ToolResult::ok(json!({
            "train_code": code,
            "depart_date": date,
            "stations": stations,
        })))
    }
}

fn travel_date(tool: &str, arguments: &Map<String, Value>) -> Result<NaiveDate, ToolError> {
    match opt_str(arguments, "date") {
        Some(date) => parse_date(tool, date),
        None => {
            let offset = opt_u64(arguments, "days_after_today").unwrap_or(1);
            Ok(Utc::now().date_naive() + Duration::days(offset as i64))
        }
    }
}

fn parse_date(tool: &str, date: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| ToolError::Validation {
        tool_name: tool.to_string(),
        reason: format!("date '{date}' is not yyyy-MM-dd: {e}"),
    })
}

fn clock(minutes: u32) -> String {
    let minutes = minutes % (24 * 60);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripclaw_core::tool::ToolStatus;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn tickets_filtered_by_class() {
        let result = TrainTicketsTool
            .invoke(&args(json!({"from_city": "Beijing", "to_city": "Shanghai", "date": "2026-05-01", "train_filter": "GD"})))
            .await
            .unwrap();
        for t in result.payload["trains"].as_array().unwrap() {
            let code = t["train_code"].as_str().unwrap();
            assert!(code.starts_with('G') || code.starts_with('D'), "{code}");
        }
        assert_eq!(result.payload["date"], "2026-05-01");
    }

    #[tokio::test]
    async fn empty_filter_returns_limit() {
        let result = TrainTicketsTool
            .invoke(&args(json!({"from_city": "Beijing", "to_city": "Xi'an", "train_filter": "", "limit": 4})))
            .await
            .unwrap();
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.payload["trains"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn bad_date_is_rejected() {
        let err = TrainTicketsTool
            .invoke(&args(json!({"from_city": "Beijing", "to_city": "Shanghai", "date": "May 1st"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[tokio::test]
    async fn stations_start_without_arrival() {
        let result = TrainStationsTool
            .invoke(&args(json!({"train_code": "G1033", "depart_date": "2026-05-01"})))
            .await
            .unwrap();
        let stations = result.payload["stations"].as_array().unwrap();
        assert!(stations.len() >= 3);
        assert!(stations[0]["arrive"].is_null());
        assert!(stations.last().unwrap()["depart"].is_null());
    }

    #[test]
    fn clock_wraps_midnight() {
        assert_eq!(clock(25 * 60 + 5), "01:05");
    }
}
