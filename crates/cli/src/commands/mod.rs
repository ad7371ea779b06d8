pub mod chat;
pub mod config_cmd;
pub mod plan;
pub mod prefs;

use tripclaw_agent::Orchestrator;
use tripclaw_config::AppConfig;

pub(crate) fn orchestrator() -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.session.backend == "memory" {
        tracing::debug!("Memory session backend; sessions end with this process");
    }
    Ok(Orchestrator::from_config(&config)?)
}
