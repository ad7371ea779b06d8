//! The state a node sees: the run's input plus every completed node's output.

use serde_json::Value;
use std::collections::BTreeMap;
use tripclaw_core::checkpoint::{NodeOutput, WorkflowCheckpoint, WorkflowInput};
use tripclaw_core::error::NodeError;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub input: WorkflowInput,
    pub outputs: BTreeMap<String, NodeOutput>,
}

impl WorkflowState {
    pub fn new(input: WorkflowInput) -> Self {
        Self {
            input,
            outputs: BTreeMap::new(),
        }
    }

    pub fn from_checkpoint(checkpoint: &WorkflowCheckpoint) -> Self {
        Self {
            input: checkpoint.input.clone(),
            outputs: checkpoint.node_outputs.clone(),
        }
    }

    pub fn output(&self, node: &str) -> Option<&NodeOutput> {
        self.outputs.get(node)
    }

    /// Payload of an upstream node that must already have run.
    pub fn require_payload(&self, node: &str) -> Result<&Value, NodeError> {
        self.outputs
            .get(node)
            .map(|o| &o.payload)
            .ok_or_else(|| NodeError::MissingInput(format!("no output from '{node}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_upstream_is_missing_input() {
        let state = WorkflowState::new(WorkflowInput::new("Suzhou"));
        let err = state.require_payload("search_places").unwrap_err();
        assert_eq!(err.kind(), "missing_input");
    }

    #[test]
    fn from_checkpoint_copies_outputs() {
        let mut cp = WorkflowCheckpoint::start("g", "a", WorkflowInput::new("Suzhou"));
        cp.node_outputs.insert("a".into(), NodeOutput::new(json!(1)));
        cp.path.push("a".into());
        let state = WorkflowState::from_checkpoint(&cp);
        assert_eq!(state.require_payload("a").unwrap(), &json!(1));
        assert_eq!(state.input.city, "Suzhou");
    }
}
