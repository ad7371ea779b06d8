//! The Node trait and the context handed to each node execution.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tripclaw_core::checkpoint::NodeOutput;
use tripclaw_core::error::NodeError;
use tripclaw_core::event::{DomainEvent, EventBus};
use tripclaw_core::preference::PreferenceProfile;
use tripclaw_core::tool::{ToolInvocation, ToolRegistry, ToolResult};

use crate::state::WorkflowState;

/// One unit of work in a workflow graph.
#[async_trait]
pub trait Node: Send + Sync {
    /// Identifier unique within the graph.
    fn id(&self) -> &str;

    /// Produce this node's output from the current state.
    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Everything a node may read while executing.
pub struct NodeContext {
    pub state: WorkflowState,
    pub preferences: PreferenceProfile,
    pub tools: Arc<ToolRegistry>,
    /// Cap on simultaneous tool calls from one node.
    pub max_fan_out: usize,
    pub events: Arc<EventBus>,
    pub trace: ToolTrace,
}

/// Shared log of every tool call made during a run, in completion order.
#[derive(Clone, Default)]
pub struct ToolTrace {
    calls: Arc<Mutex<Vec<(ToolInvocation, ToolResult)>>>,
}

impl ToolTrace {
    pub fn record(&self, invocation: ToolInvocation, result: ToolResult) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((invocation, result));
        }
    }

    /// Drain the recorded calls.
    pub fn take(&self) -> Vec<(ToolInvocation, ToolResult)> {
        self.calls
            .lock()
            .map(|mut calls| std::mem::take(&mut *calls))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeContext {
    pub fn city(&self) -> &str {
        &self.state.input.city
    }

    /// Invoke a tool through the registry and publish the outcome.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> ToolResult {
        let invocation = ToolInvocation::new(tool_name, arguments);
        let started = Instant::now();
        let result = self.tools.invoke(&invocation).await;
        self.events.publish(DomainEvent::ToolInvoked {
            tool_name: tool_name.to_string(),
            status: format!("{:?}", result.status).to_lowercase(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        self.trace.record(invocation, result.clone());
        result
    }

    /// Like [`call_tool`](Self::call_tool) but maps an error result to a
    /// message, for use inside fan-out.
    pub async fn call_tool_ok(&self, tool_name: &str, arguments: Value) -> Result<Value, String> {
        let result = self.call_tool(tool_name, arguments).await;
        if result.is_success() {
            Ok(result.payload)
        } else {
            Err(result
                .error_detail
                .unwrap_or_else(|| format!("{tool_name} returned an error")))
        }
    }
}
