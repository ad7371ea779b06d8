//! Configuration loading, validation, and management for tripclaw.
//!
//! Loads configuration from `~/.tripclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.tripclaw/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context window budget and compaction
    #[serde(default)]
    pub context: ContextConfig,

    /// Workflow engine limits
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Tool dispatch settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Session storage backend
    #[serde(default)]
    pub session: SessionConfig,
}

/// Context window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Compaction triggers when the session's token estimate exceeds this
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// Upper bound on messages kept verbatim after compaction
    #[serde(default = "default_keep_recent")]
    pub keep_recent_messages: usize,
}

fn default_threshold() -> usize {
    4000
}
fn default_keep_recent() -> usize {
    20
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            keep_recent_messages: default_keep_recent(),
        }
    }
}

/// Workflow engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Simultaneous outstanding tool calls per node
    #[serde(default = "default_max_fan_out")]
    pub max_fan_out: usize,

    /// Per-node deadline in seconds
    #[serde(default = "default_node_deadline")]
    pub node_deadline_secs: u64,
}

fn default_max_fan_out() -> usize {
    3
}
fn default_node_deadline() -> u64 {
    30
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_fan_out: default_max_fan_out(),
            node_deadline_secs: default_node_deadline(),
        }
    }
}

impl WorkflowConfig {
    pub fn node_deadline(&self) -> Duration {
        Duration::from_secs(self.node_deadline_secs)
    }
}

/// Tool dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Handler timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_call_timeout() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Session storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// "memory" or "file"
    #[serde(default = "default_session_backend")]
    pub backend: String,

    /// Directory for the file backend (default: ~/.tripclaw/sessions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_session_backend() -> String {
    "memory".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            dir: None,
        }
    }
}

impl SessionConfig {
    /// Resolved directory for the file backend.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("sessions"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tripclaw/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `TRIPCLAW_CONTEXT_THRESHOLD`
    /// - `TRIPCLAW_MAX_FAN_OUT`
    /// - `TRIPCLAW_SESSION_DIR` (also selects the file backend)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("TRIPCLAW_CONTEXT_THRESHOLD") {
            self.context.threshold = parse_env("TRIPCLAW_CONTEXT_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("TRIPCLAW_MAX_FAN_OUT") {
            self.workflow.max_fan_out = parse_env("TRIPCLAW_MAX_FAN_OUT", &raw)?;
        }
        if let Some(dir) = lookup("TRIPCLAW_SESSION_DIR") {
            self.session.backend = "file".into();
            self.session.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tripclaw")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.threshold == 0 {
            return Err(ConfigError::ValidationError(
                "context.threshold must be > 0".into(),
            ));
        }
        if self.context.keep_recent_messages == 0 {
            return Err(ConfigError::ValidationError(
                "context.keep_recent_messages must be >= 1".into(),
            ));
        }
        if self.workflow.max_fan_out == 0 {
            return Err(ConfigError::ValidationError(
                "workflow.max_fan_out must be >= 1".into(),
            ));
        }
        if self.workflow.node_deadline_secs == 0 || self.tools.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "deadlines and timeouts must be at least one second".into(),
            ));
        }
        if !matches!(self.session.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "unknown session backend '{}' (expected 'memory' or 'file')",
                self.session.backend
            )));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key}='{raw}' is not a valid number")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
