//! Built-in travel tools for tripclaw.
//!
//! Tools give the planner access to the outside world: rail tickets and
//! timetables, maps (geocoding, POI search, routing, weather), hotel
//! inventory and web search. The built-ins are deterministic offline stubs;
//! production deployments register real clients under the same names.

pub mod geo;
pub mod hotel;
mod stub;
pub mod transit;
pub mod weather;
pub mod web_search;

use std::time::Duration;
use tripclaw_core::tool::ToolRegistry;

/// Create a registry with every built-in tool and the given per-call timeout.
pub fn default_registry(call_timeout: Duration) -> ToolRegistry {
    let mut registry = ToolRegistry::new().with_call_timeout(call_timeout);
    registry.register(Box::new(transit::TrainTicketsTool));
    registry.register(Box::new(transit::TrainStationsTool));
    registry.register(Box::new(weather::WeatherTool));
    registry.register(Box::new(geo::GeocodeTool));
    registry.register(Box::new(geo::PoiSearchTool));
    registry.register(Box::new(geo::RouteDirectionsTool));
    registry.register(Box::new(hotel::HotelSearchTool));
    registry.register(Box::new(web_search::WebSearchTool));
    registry
}
