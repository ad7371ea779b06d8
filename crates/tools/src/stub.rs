//! Helpers shared by the offline tool stubs.
//!
//! Every stub derives its data from a stable hash of its inputs, so the same
//! call always returns the same payload and tests can assert on it.

use serde_json::{Map, Value};
use tracing::debug;
use tripclaw_core::error::ToolError;

/// FNV-style rolling hash; stable across runs and platforms.
pub(crate) fn stable_hash(parts: &[&str]) -> u32 {
    parts.iter().fold(2_166_136_261u32, |acc, part| {
        part.bytes()
            .fold(acc, |h, b| (h ^ b as u32).wrapping_mul(16_777_619))
            .wrapping_mul(31)
    })
}

/// Fetch a required string argument.
pub(crate) fn str_arg<'a>(
    tool: &str,
    arguments: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::Validation {
            tool_name: tool.to_string(),
            reason: format!("'{name}' must be a non-empty string"),
        })
}

pub(crate) fn opt_str<'a>(arguments: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str)
}

pub(crate) fn opt_u64(arguments: &Map<String, Value>, name: &str) -> Option<u64> {
    arguments.get(name).and_then(Value::as_u64)
}

pub(crate) fn opt_f64(arguments: &Map<String, Value>, name: &str) -> Option<f64> {
    arguments.get(name).and_then(Value::as_f64)
}

/// Pseudo coordinates inside a city's bounding box.
pub(crate) fn coordinates(city: &str, place: &str) -> (f64, f64) {
    let (base_lng, base_lat) = city_center(city);
    let h = stable_hash(&[city, place]);
    let dlng = ((h % 2000) as f64 - 1000.0) / 10_000.0;
    let dlat = (((h / 2000) % 2000) as f64 - 1000.0) / 10_000.0;
    (round6(base_lng + dlng), round6(base_lat + dlat))
}

fn city_center(city: &str) -> (f64, f64) {
    match city.trim().to_lowercase().as_str() {
        "beijing" | "北京" => (116.4074, 39.9042),
        "shanghai" | "上海" => (121.4737, 31.2304),
        "hangzhou" | "杭州" => (120.1551, 30.2741),
        "chengdu" | "成都" => (104.0665, 30.5723),
        "xi'an" | "xian" | "西安" => (108.9398, 34.3416),
        "guangzhou" | "广州" => (113.2644, 23.1291),
        _ => {
            debug!(city, "City not in stub table, deriving a center from its name");
            let h = stable_hash(&[city]);
            (100.0 + (h % 2000) as f64 / 100.0, 22.0 + ((h / 2000) % 1800) as f64 / 100.0)
        }
    }
}

/// Great-circle distance in metres.
pub(crate) fn distance_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * 6_371_000.0 * h.sqrt().asin()
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_order_sensitive() {
        assert_eq!(stable_hash(&["a", "b"]), stable_hash(&["a", "b"]));
        assert_ne!(stable_hash(&["a", "b"]), stable_hash(&["b", "a"]));
    }

    #[test]
    fn coordinates_stay_near_city_center() {
        let (lng, lat) = coordinates("Shanghai", "The Bund");
        assert!((lng - 121.4737).abs() <= 0.1);
        assert!((lat - 31.2304).abs() <= 0.1);
    }

    #[test]
    fn unknown_city_gets_a_stable_center() {
        let a = coordinates("Lhasa", "Potala");
        assert_eq!(a, coordinates("Lhasa", "Potala"));
        let (lng, lat) = city_center("Lhasa");
        assert!((100.0..120.0).contains(&lng));
        assert!((22.0..40.0).contains(&lat));
    }

    #[test]
    fn distance_is_symmetric() {
        let a = (121.47, 31.23);
        let b = (121.50, 31.24);
        let d = distance_m(a, b);
        assert!(d > 2000.0 && d < 5000.0);
        assert!((d - distance_m(b, a)).abs() < 1e-6);
    }
}
