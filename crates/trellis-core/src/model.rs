//! Core data structures for the relayed graph

use std::time::Duration;

use serde::Serialize;

/// One opaque unit of the analyzed graph. The schema belongs to the analysis tool.
pub type Node = serde_json::Value;

/// Ordered sequence of nodes, flattened across every document of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Graph { nodes }
    }

    /// Append every node of one decoded document, keeping emission order.
    pub fn extend_document(&mut self, document: Vec<Node>) {
        self.nodes.extend(document);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl From<Vec<Node>> for Graph {
    fn from(nodes: Vec<Node>) -> Self {
        Graph::from_nodes(nodes)
    }
}

/// Immutable pairing of a graph with the latency of the run that produced it.
///
/// Snapshots are shared behind `Arc` once published and never mutated; a newer
/// recompute produces a whole new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    run: u64,
    graph: Graph,
    elapsed_ms: u64,
}

impl GraphSnapshot {
    pub fn new(run: u64, graph: Graph, elapsed: Duration) -> Self {
        GraphSnapshot {
            run,
            graph,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Sequence number of the recompute that produced this snapshot.
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}
