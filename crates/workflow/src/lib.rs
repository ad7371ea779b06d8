//! Workflow engine: checkpointed directed graphs of async nodes.
//!
//! A [`Graph`] is validated once at build time. The [`WorkflowEngine`] runs a
//! graph for a session, saving a [`WorkflowCheckpoint`](tripclaw_core::WorkflowCheckpoint)
//! to the session store after every node so an interrupted or failed run
//! resumes exactly where it stopped. Nodes that look up several independent
//! items use [`fan_out`] to keep a bounded number of tool calls in flight.
//!
//! The travel recommendation pipeline lives in [`nodes`].

pub mod engine;
pub mod fanout;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod state;

pub use engine::{InterruptHandle, RunControl, WorkflowEngine};
pub use fanout::{FanOutResults, fan_out};
pub use graph::{Edge, Graph, GraphBuilder};
pub use node::{Node, NodeContext, ToolTrace};
pub use nodes::{RECOMMENDATION_GRAPH, recommendation_graph};
pub use state::WorkflowState;
