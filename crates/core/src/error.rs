//! Error types for the tripclaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all tripclaw operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Workflow errors ---
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    // --- Session store errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Context compaction ---
    #[error("Compaction error: {0}")]
    Compaction(#[from] CompactionError),

    // --- Middleware ---
    #[error("Middleware error: {0}")]
    Middleware(#[from] MiddlewareError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures at the tool boundary.
///
/// These never escape [`ToolRegistry::invoke`](crate::tool::ToolRegistry::invoke);
/// the registry folds them into an error [`ToolResult`](crate::tool::ToolResult).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    Validation { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },
}

/// Why a single workflow node could not produce output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NodeError {
    #[error("{tool_name} failed: {detail}")]
    Tool { tool_name: String, detail: String },

    #[error("all {attempted} lookups failed: {detail}")]
    AllItemsFailed { attempted: usize, detail: String },

    #[error("node exceeded its {deadline_ms}ms deadline")]
    Timeout { deadline_ms: u64 },

    #[error("waiting for user input: {0}")]
    AwaitingInput(String),

    #[error("missing input: {0}")]
    MissingInput(String),
}

impl NodeError {
    /// Short machine-readable tag stored in failed checkpoints.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::Tool { .. } => "tool",
            NodeError::AllItemsFailed { .. } => "all_items_failed",
            NodeError::Timeout { .. } => "timeout",
            NodeError::AwaitingInput(_) => "awaiting_input",
            NodeError::MissingInput(_) => "missing_input",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid graph {graph_id}: {reason}")]
    InvalidGraph { graph_id: String, reason: String },

    #[error("Unknown graph: {0}")]
    UnknownGraph(String),

    #[error("Checkpoint write failed: {0}")]
    Store(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt checkpoint for session {session_id}: {reason}")]
    CorruptCheckpoint { session_id: String, reason: String },

    #[error("Session serialization failed: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompactionError {
    #[error("Summarizer unavailable: {0}")]
    SummarizerUnavailable(String),

    #[error("Summarizer produced an empty summary")]
    EmptySummary,
}

/// A middleware stage failed; the turn is aborted.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("stage '{stage}' failed: {reason}")]
pub struct MiddlewareError {
    pub stage: String,
    pub reason: String,
}

impl MiddlewareError {
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::Validation {
            tool_name: "hotel_search".into(),
            reason: "missing required argument 'city'".into(),
        });
        assert!(err.to_string().contains("hotel_search"));
        assert!(err.to_string().contains("city"));
    }

    #[test]
    fn node_error_kinds_are_stable() {
        assert_eq!(NodeError::Timeout { deadline_ms: 5 }.kind(), "timeout");
        assert_eq!(
            NodeError::AllItemsFailed { attempted: 3, detail: String::new() }.kind(),
            "all_items_failed"
        );
    }

    #[test]
    fn store_error_converts_into_workflow_error() {
        let err: WorkflowError = SessionError::Storage("disk full".into()).into();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn middleware_error_names_stage() {
        let err = MiddlewareError::new("compaction", "boom");
        assert_eq!(err.to_string(), "stage 'compaction' failed: boom");
    }
}
