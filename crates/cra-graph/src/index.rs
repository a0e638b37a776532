//! Adjacency index over a snapshot, backed by petgraph.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::types::GraphSnapshot;

/// Directed graph of node ids; edge weights are link positions in the snapshot.
pub struct GraphIndex {
    graph: DiGraph<String, usize>,
    node_index: HashMap<String, NodeIndex>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    pub fn build(snapshot: &GraphSnapshot) -> Self {
        let mut index = Self::new();
        for node in &snapshot.nodes {
            index.add_node(&node.id);
        }
        for (i, link) in snapshot.links.iter().enumerate() {
            let source = index.add_node(&link.source);
            let target = index.add_node(&link.target);
            index.graph.add_edge(source, target, i);
        }
        index
    }

    fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.node_index.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.node_index.insert(id.to_string(), idx);
        idx
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Positions of every link with `id` as source or target.
    pub fn incident_links(&self, id: &str) -> BTreeSet<usize> {
        let Some(&idx) = self.node_index.get(id) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| *e.weight())
            .collect()
    }

    /// Ids adjacent to `id` in either direction.
    pub fn neighbors(&self, id: &str) -> BTreeSet<String> {
        let Some(&idx) = self.node_index.get(id) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_undirected(idx)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
        }
    }
}

impl Default for GraphIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}
