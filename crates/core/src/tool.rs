//! Tool trait: the uniform contract over external travel capabilities.
//!
//! Transit ticketing, maps/geocoding, hotel inventory and web search are all
//! tools: a named handler with a declared argument schema. The registry
//! validates arguments before dispatch and turns every failure (unknown tool,
//! bad arguments, handler error, timeout) into an error [`ToolResult`], so
//! callers never see a tool fault as an `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Default per-call handler timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// The closed set of capability families a tool can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Rail tickets and timetables
    Transit,
    /// Geocoding, POI search, routing, weather
    Geo,
    /// Hotel inventory
    Hotel,
    /// Web search for reviews and current information
    Search,
}

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Partial,
    Error,
}

/// The result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,

    #[serde(default)]
    pub payload: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        Self {
            status: ToolStatus::Ok,
            payload,
            error_detail: None,
        }
    }

    pub fn partial(payload: Value, detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Partial,
            payload,
            error_detail: Some(detail.into()),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            payload: Value::Null,
            error_detail: Some(detail.into()),
        }
    }

    /// `ok` and `partial` both carry usable payloads.
    pub fn is_success(&self) -> bool {
        self.status != ToolStatus::Error
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::error(err.to_string())
    }
}

// ── Schema ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    /// Allowed string values, if restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// The declared argument schema of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, param_type: ParamType, required: bool, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            param_type,
            required,
            allowed: None,
            description: description.to_string(),
        });
        self
    }

    pub fn required(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.push(name, param_type, true, description)
    }

    pub fn optional(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.push(name, param_type, false, description)
    }

    /// Restrict the most recently added string parameter to a fixed set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        if let Some(last) = self.params.last_mut() {
            last.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        }
        self
    }

    /// Check arguments against the schema.
    ///
    /// Rejects missing required parameters, wrong types, values outside an
    /// allowed set, and parameters the schema does not declare.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), String> {
        for key in arguments.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(format!("unknown argument '{key}'"));
            }
        }

        for param in &self.params {
            match arguments.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(format!("missing required argument '{}'", param.name));
                    }
                }
                Some(value) => {
                    if !param.param_type.matches(value) {
                        return Err(format!(
                            "argument '{}' must be of type {:?}",
                            param.name, param.param_type
                        ));
                    }
                    if let (Some(allowed), Some(s)) = (&param.allowed, value.as_str()) {
                        if !allowed.iter().any(|a| a == s) {
                            return Err(format!(
                                "argument '{}' must be one of [{}], got '{s}'",
                                param.name,
                                allowed.join(", ")
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Tool trait & registry ─────────────────────────────────────────────────

/// The handler interface every tool implements.
///
/// Tools are individually swappable: tests register mocks under the same
/// names the workflow nodes call, with no engine changes.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique registry name (e.g. "poi_search").
    fn name(&self) -> &str;

    /// Capability family.
    fn kind(&self) -> ToolKind;

    /// One-line description for operators and policies.
    fn description(&self) -> &str;

    /// Declared argument schema.
    fn schema(&self) -> ToolSchema;

    /// Execute with already-validated arguments.
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolResult, ToolError>;
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    call_timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the per-call handler timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Names of registered tools in one capability family.
    pub fn names_of_kind(&self, kind: ToolKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .values()
            .filter(|t| t.kind() == kind)
            .map(|t| t.name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Validate and dispatch a tool call. Never fails: every error becomes
    /// a `ToolResult` with `status = error`.
    pub async fn invoke(&self, invocation: &ToolInvocation) -> ToolResult {
        let name = invocation.tool_name.as_str();
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Tool not found");
            return ToolError::NotFound(name.to_string()).into();
        };

        if let Err(reason) = tool.schema().validate(&invocation.arguments) {
            warn!(tool = %name, %reason, "Rejected tool arguments");
            return ToolError::Validation {
                tool_name: name.to_string(),
                reason,
            }
            .into();
        }

        match tokio::time::timeout(self.call_timeout, tool.invoke(&invocation.arguments)).await {
            Ok(Ok(result)) => {
                debug!(tool = %name, status = ?result.status, "Tool completed");
                result
            }
            Ok(Err(err)) => {
                warn!(tool = %name, error = %err, "Tool failed");
                err.into()
            }
            Err(_) => {
                warn!(tool = %name, timeout_ms = self.call_timeout.as_millis() as u64, "Tool timed out");
                ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_ms: self.call_timeout.as_millis() as u64,
                }
                .into()
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
