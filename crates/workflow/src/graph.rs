//! Directed workflow graphs.
//!
//! A graph is a node table, an entry node and an ordered edge list. Edges may
//! carry a predicate over [`WorkflowState`]; after a node completes, the first
//! edge (in insertion order) whose predicate holds names the next node, and a
//! node with no matching edge is terminal. Graphs are validated once when
//! built: cycles are rejected, so every run terminates.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tripclaw_core::error::WorkflowError;

use crate::node::Node;
use crate::state::WorkflowState;

pub type EdgeCondition = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

impl Edge {
    fn holds(&self, state: &WorkflowState) -> bool {
        self.condition.as_ref().is_none_or(|c| c(state))
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

pub struct Graph {
    id: String,
    entry: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn builder(id: impl Into<String>) -> GraphBuilder {
        GraphBuilder {
            id: id.into(),
            entry: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, id: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The node to run after `node`, or `None` when `node` is terminal.
    pub fn next(&self, node: &str, state: &WorkflowState) -> Option<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == node)
            .find(|e| e.holds(state))
            .map(|e| e.to.as_str())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes: Vec<&String> = self.nodes.keys().collect();
        nodes.sort();
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("entry", &self.entry)
            .field("nodes", &nodes)
            .field("edges", &self.edges)
            .finish()
    }
}

pub struct GraphBuilder {
    id: String,
    entry: Option<String>,
    nodes: Vec<Arc<dyn Node>>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    /// Add a node. The first node added becomes the entry unless
    /// [`entry`](Self::entry) says otherwise.
    pub fn node(mut self, node: impl Node + 'static) -> Self {
        self.nodes.push(Arc::new(node));
        self
    }

    pub fn entry(mut self, id: impl Into<String>) -> Self {
        self.entry = Some(id.into());
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    pub fn edge_if(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        });
        self
    }

    /// Chain nodes with unconditional edges in the given order.
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for pair in ids.windows(2) {
            self = self.edge(pair[0], pair[1]);
        }
        self
    }

    pub fn build(self) -> Result<Graph, WorkflowError> {
        let invalid = |reason: String| WorkflowError::InvalidGraph {
            graph_id: self.id.clone(),
            reason,
        };

        let mut nodes: HashMap<String, Arc<dyn Node>> = HashMap::new();
        for node in &self.nodes {
            let id = node.id().to_string();
            if nodes.insert(id.clone(), node.clone()).is_some() {
                return Err(invalid(format!("duplicate node '{id}'")));
            }
        }

        let entry = match &self.entry {
            Some(e) => e.clone(),
            None => match self.nodes.first() {
                Some(n) => n.id().to_string(),
                None => return Err(invalid("graph has no nodes".into())),
            },
        };
        if !nodes.contains_key(&entry) {
            return Err(invalid(format!("entry node '{entry}' does not exist")));
        }

        let mut unconditional: HashSet<&str> = HashSet::new();
        for edge in &self.edges {
            for end in [&edge.from, &edge.to] {
                if !nodes.contains_key(end) {
                    return Err(invalid(format!(
                        "edge {} -> {} names unknown node '{end}'",
                        edge.from, edge.to
                    )));
                }
            }
            if edge.condition.is_none() && !unconditional.insert(edge.from.as_str()) {
                return Err(invalid(format!(
                    "node '{}' has more than one unconditional edge",
                    edge.from
                )));
            }
        }

        if let Some(cycle_at) = find_cycle(&nodes, &self.edges) {
            return Err(invalid(format!("cycle through '{cycle_at}'")));
        }

        Ok(Graph {
            id: self.id,
            entry,
            nodes,
            edges: self.edges,
        })
    }
}

/// Depth-first search; returns a node on a cycle if one exists.
fn find_cycle(nodes: &HashMap<String, Arc<dyn Node>>, edges: &[Edge]) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Option<String> {
        match marks.get(node).copied().unwrap_or(Mark::Unvisited) {
            Mark::InProgress => return Some(node.to_string()),
            Mark::Done => return None,
            Mark::Unvisited => {}
        }
        marks.insert(node, Mark::InProgress);
        for &next in adjacency.get(node).into_iter().flatten() {
            if let Some(found) = visit(next, adjacency, marks) {
                return Some(found);
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    let mut ids: Vec<&str> = nodes.keys().map(String::as_str).collect();
    ids.sort_unstable();
    let mut marks = HashMap::new();
    ids.into_iter().find_map(|id| visit(id, &adjacency, &mut marks))
}
