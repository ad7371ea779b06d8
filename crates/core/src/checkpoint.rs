//! Workflow checkpoints: durable snapshots that let a run resume without replay.
//!
//! A checkpoint is written at every node boundary. It is a typed record
//! (explicit status enum, typed node outputs) rather than an opaque blob, and
//! reloading a malformed record is an error, never a silent partial state.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{NodeError, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl CheckpointStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckpointStatus::Completed | CheckpointStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Running => "running",
            CheckpointStatus::Suspended => "suspended",
            CheckpointStatus::Completed => "completed",
            CheckpointStatus::Failed => "failed",
        }
    }
}

/// Longest trip a run will plan.
pub const MAX_TRIP_DAYS: u32 = 7;

/// The initial input of a recommendation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub city: String,
    #[serde(default)]
    pub query: String,
    /// Always within `1..=MAX_TRIP_DAYS`, also when read from a record.
    #[serde(default = "default_days", deserialize_with = "deserialize_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    1
}

fn clamp_days(days: u32) -> u32 {
    days.clamp(1, MAX_TRIP_DAYS)
}

fn deserialize_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    u32::deserialize(deserializer).map(clamp_days)
}

impl WorkflowInput {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            query: String::new(),
            days: default_days(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = clamp_days(days);
        self
    }
}

/// A fan-out item that failed while its siblings succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item: String,
    pub detail: String,
}

/// Output of one workflow node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub payload: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,

    /// Set when the node fell back to a weaker strategy (e.g. a route mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl NodeOutput {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            failures: Vec::new(),
            degraded: None,
        }
    }

    pub fn with_failures(mut self, failures: Vec<ItemFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn degraded(mut self, reason: impl Into<String>) -> Self {
        self.degraded = Some(reason.into());
        self
    }
}

/// The node that stopped a run and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointError {
    pub node: String,
    pub kind: String,
    pub detail: String,
}

impl CheckpointError {
    pub fn from_node(node: &str, err: &NodeError) -> Self {
        Self {
            node: node.to_string(),
            kind: err.kind().to_string(),
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub graph_id: String,
    /// Next node to execute (or the node that failed / suspended).
    pub current_node: String,
    pub node_outputs: BTreeMap<String, NodeOutput>,
    /// Completed nodes in execution order.
    pub path: Vec<String>,
    pub status: CheckpointStatus,
    pub input: WorkflowInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckpointError>,
}

const RECORD_KEYS: [&str; 7] = [
    "graph_id",
    "current_node",
    "node_outputs",
    "path",
    "status",
    "input",
    "error",
];

impl WorkflowCheckpoint {
    /// A fresh checkpoint positioned at the graph's entry node.
    pub fn start(graph_id: impl Into<String>, entry: impl Into<String>, input: WorkflowInput) -> Self {
        Self {
            graph_id: graph_id.into(),
            current_node: entry.into(),
            node_outputs: BTreeMap::new(),
            path: Vec::new(),
            status: CheckpointStatus::Running,
            input,
            error: None,
        }
    }

    pub fn output(&self, node: &str) -> Option<&NodeOutput> {
        self.node_outputs.get(node)
    }

    /// Whether `run` should continue this checkpoint rather than start over.
    pub fn is_resumable(&self) -> bool {
        self.status != CheckpointStatus::Completed
    }

    /// Flatten into a map with one entry per field, for storage backends that
    /// keep map-of-maps.
    pub fn to_record(&self) -> Result<BTreeMap<String, Value>, SessionError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(other) => Err(SessionError::Serialization(format!(
                "checkpoint serialized to non-object: {other}"
            ))),
            Err(e) => Err(SessionError::Serialization(e.to_string())),
        }
    }

    /// Rebuild from a flat record, rejecting anything malformed.
    pub fn from_record(
        session_id: &str,
        record: &BTreeMap<String, Value>,
    ) -> Result<Self, SessionError> {
        let corrupt = |reason: String| SessionError::CorruptCheckpoint {
            session_id: session_id.to_string(),
            reason,
        };

        if let Some(unknown) = record.keys().find(|k| !RECORD_KEYS.contains(&k.as_str())) {
            return Err(corrupt(format!("unexpected field '{unknown}'")));
        }

        let object: serde_json::Map<String, Value> =
            record.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let checkpoint: WorkflowCheckpoint =
            serde_json::from_value(Value::Object(object)).map_err(|e| corrupt(e.to_string()))?;

        checkpoint.check_consistency().map_err(corrupt)?;
        Ok(checkpoint)
    }

    fn check_consistency(&self) -> Result<(), String> {
        if self.graph_id.is_empty() || self.current_node.is_empty() {
            return Err("empty graph id or current node".into());
        }
        if self.path.len() != self.node_outputs.len() {
            return Err(format!(
                "path has {} nodes but {} outputs are stored",
                self.path.len(),
                self.node_outputs.len()
            ));
        }
        if let Some(missing) = self.path.iter().find(|n| !self.node_outputs.contains_key(*n)) {
            return Err(format!("path names '{missing}' which has no output"));
        }
        if self.status == CheckpointStatus::Failed && self.error.is_none() {
            return Err("failed checkpoint without error detail".into());
        }
        Ok(())
    }
}
