//! Workflow engine: runs a graph node by node, checkpointing at every boundary.
//!
//! Each completed node's output is inserted into the checkpoint, the node is
//! appended to the path, `current_node` advances, and the checkpoint is saved
//! to the session store before the next node starts. A run that stops for any
//! reason (node failure, suspension, crash) can therefore be resumed from the
//! store without re-executing a completed node.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use tripclaw_core::checkpoint::{CheckpointError, CheckpointStatus, WorkflowCheckpoint, WorkflowInput};
use tripclaw_core::error::{NodeError, WorkflowError};
use tripclaw_core::event::{DomainEvent, EventBus};
use tripclaw_core::preference::PreferenceProfile;
use tripclaw_core::session::SessionStore;
use tripclaw_core::tool::ToolRegistry;

use crate::graph::Graph;
use crate::node::{NodeContext, ToolTrace};
use crate::state::WorkflowState;

/// Default cap on simultaneous tool calls per node.
pub const DEFAULT_MAX_FAN_OUT: usize = 3;
/// Default per-node deadline.
pub const DEFAULT_NODE_DEADLINE: Duration = Duration::from_secs(30);

/// External request to stop a run at the next node boundary.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Per-run controls: interruption and the tool-call trace.
#[derive(Clone, Default)]
pub struct RunControl {
    pub interrupt: InterruptHandle,
    pub trace: ToolTrace,
}

pub struct WorkflowEngine {
    graphs: HashMap<String, Arc<Graph>>,
    store: Arc<dyn SessionStore>,
    tools: Arc<ToolRegistry>,
    events: Arc<EventBus>,
    max_fan_out: usize,
    node_deadline: Duration,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn SessionStore>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            graphs: HashMap::new(),
            store,
            tools,
            events: Arc::new(EventBus::default()),
            max_fan_out: DEFAULT_MAX_FAN_OUT,
            node_deadline: DEFAULT_NODE_DEADLINE,
        }
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_limits(mut self, max_fan_out: usize, node_deadline: Duration) -> Self {
        self.max_fan_out = max_fan_out.max(1);
        self.node_deadline = node_deadline;
        self
    }

    /// Register a graph, replacing any graph with the same id.
    pub fn register_graph(&mut self, graph: Graph) {
        debug!(graph_id = %graph.id(), "Registering workflow graph");
        self.graphs.insert(graph.id().to_string(), Arc::new(graph));
    }

    pub fn graph(&self, graph_id: &str) -> Option<&Graph> {
        self.graphs.get(graph_id).map(|g| g.as_ref())
    }

    /// Run (or resume) a graph for a session with default controls.
    pub async fn run(
        &self,
        session_id: &str,
        graph_id: &str,
        input: WorkflowInput,
        preferences: &PreferenceProfile,
        checkpoint: Option<WorkflowCheckpoint>,
    ) -> Result<WorkflowCheckpoint, WorkflowError> {
        self.run_with(session_id, graph_id, input, preferences, checkpoint, &RunControl::default())
            .await
    }

    /// Run (or resume) a graph for a session.
    ///
    /// A checkpoint for the same graph that is not completed is resumed at its
    /// `current_node` with its stored input; anything else starts a fresh run
    /// from the entry node with `input`. Node failures, suspensions and
    /// interrupts are reported through the returned checkpoint's status. The
    /// only `Err` is an unknown graph or a checkpoint write that failed.
    pub async fn run_with(
        &self,
        session_id: &str,
        graph_id: &str,
        input: WorkflowInput,
        preferences: &PreferenceProfile,
        checkpoint: Option<WorkflowCheckpoint>,
        control: &RunControl,
    ) -> Result<WorkflowCheckpoint, WorkflowError> {
        let graph = self
            .graphs
            .get(graph_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownGraph(graph_id.to_string()))?;

        let mut cp = match checkpoint {
            Some(mut cp) if cp.graph_id == graph_id && cp.is_resumable() => {
                if !graph.contains(&cp.current_node) {
                    return Err(WorkflowError::InvalidGraph {
                        graph_id: graph_id.to_string(),
                        reason: format!("checkpoint names unknown node '{}'", cp.current_node),
                    });
                }
                info!(
                    session_id,
                    graph_id,
                    node = %cp.current_node,
                    status = cp.status.as_str(),
                    completed = cp.path.len(),
                    "Resuming workflow"
                );
                cp.status = CheckpointStatus::Running;
                cp.error = None;
                cp
            }
            _ => {
                info!(session_id, graph_id, city = %input.city, "Starting workflow");
                WorkflowCheckpoint::start(graph_id, graph.entry(), input)
            }
        };
        self.store.save_checkpoint(session_id, cp.clone()).await?;

        loop {
            if control.interrupt.is_interrupted() {
                info!(session_id, graph_id, node = %cp.current_node, "Workflow interrupted");
                cp.status = CheckpointStatus::Suspended;
                self.store.save_checkpoint(session_id, cp.clone()).await?;
                return Ok(cp);
            }

            let node_id = cp.current_node.clone();
            let Some(node) = graph.node(&node_id).cloned() else {
                return Err(WorkflowError::InvalidGraph {
                    graph_id: graph_id.to_string(),
                    reason: format!("no node '{node_id}'"),
                });
            };

            let ctx = NodeContext {
                state: WorkflowState::from_checkpoint(&cp),
                preferences: preferences.clone(),
                tools: self.tools.clone(),
                max_fan_out: self.max_fan_out,
                events: self.events.clone(),
                trace: control.trace.clone(),
            };

            debug!(session_id, node = %node_id, "Executing node");
            let result = match tokio::time::timeout(self.node_deadline, node.execute(&ctx)).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout {
                    deadline_ms: self.node_deadline.as_millis() as u64,
                }),
            };

            match result {
                Ok(output) => {
                    cp.node_outputs.insert(node_id.clone(), output);
                    cp.path.push(node_id.clone());
                    let state = WorkflowState::from_checkpoint(&cp);
                    match graph.next(&node_id, &state) {
                        Some(next) => cp.current_node = next.to_string(),
                        None => cp.status = CheckpointStatus::Completed,
                    }
                    self.store.save_checkpoint(session_id, cp.clone()).await?;
                    info!(session_id, graph_id, node = %node_id, "Node completed");
                    self.events.publish(DomainEvent::NodeCompleted {
                        session_id: session_id.to_string(),
                        graph_id: graph_id.to_string(),
                        node: node_id,
                        timestamp: Utc::now(),
                    });
                    if cp.status == CheckpointStatus::Completed {
                        info!(session_id, graph_id, path = ?cp.path, "Workflow completed");
                        return Ok(cp);
                    }
                }
                Err(err @ NodeError::AwaitingInput(_)) => {
                    info!(session_id, node = %node_id, reason = %err, "Workflow suspended by node");
                    cp.status = CheckpointStatus::Suspended;
                    cp.error = Some(CheckpointError::from_node(&node_id, &err));
                    self.store.save_checkpoint(session_id, cp.clone()).await?;
                    return Ok(cp);
                }
                Err(err) => {
                    warn!(session_id, graph_id, node = %node_id, error = %err, "Node failed");
                    cp.status = CheckpointStatus::Failed;
                    cp.error = Some(CheckpointError::from_node(&node_id, &err));
                    self.store.save_checkpoint(session_id, cp.clone()).await?;
                    self.events.publish(DomainEvent::NodeFailed {
                        session_id: session_id.to_string(),
                        graph_id: graph_id.to_string(),
                        node: node_id,
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Ok(cp);
                }
            }
        }
    }
}
