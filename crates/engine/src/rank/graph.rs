//! Link graph representation
//!
//! Provides an indexed, deduplicated view of the edge set for ranking

use linkforge_common::types::LinkEdge;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// In-memory link graph over a fixed node set
///
/// Nodes are stored sorted by id, so iteration order (and with it every
/// floating-point sum over the graph) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    /// Node ids, sorted
    nodes: Vec<Uuid>,

    /// id -> position in `nodes`
    index: HashMap<Uuid, usize>,

    /// Adjacency list: node -> nodes it links to
    outgoing: Vec<Vec<usize>>,

    /// Reverse adjacency: node -> nodes linking to it
    incoming: Vec<Vec<usize>>,

    /// Distinct ordered pairs
    edge_count: usize,

    /// Edges naming a node outside the node set
    dropped_edges: usize,
}

impl LinkGraph {
    /// Create a graph with nodes and no edges
    pub fn new(node_ids: impl IntoIterator<Item = Uuid>) -> Self {
        let mut nodes: Vec<Uuid> = node_ids.into_iter().collect();
        nodes.sort_unstable();
        nodes.dedup();

        let index = nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let n = nodes.len();

        Self {
            nodes,
            index,
            outgoing: vec![Vec::new(); n],
            incoming: vec![Vec::new(); n],
            edge_count: 0,
            dropped_edges: 0,
        }
    }

    /// Build from stored edges.
    ///
    /// Duplicate pairs count once, self-loops are ignored and edges naming an
    /// unknown node are dropped and counted.
    pub fn from_edges(node_ids: impl IntoIterator<Item = Uuid>, edges: &[LinkEdge]) -> Self {
        let mut graph = Self::new(node_ids);
        let mut seen = HashSet::new();

        for edge in edges {
            if edge.source_id == edge.target_id {
                continue;
            }
            if !seen.insert((edge.source_id, edge.target_id)) {
                continue;
            }
            graph.add_edge(edge.source_id, edge.target_id);
        }

        for list in graph.outgoing.iter_mut().chain(graph.incoming.iter_mut()) {
            list.sort_unstable();
        }
        graph
    }

    /// Add an edge between known nodes; returns false if it was dropped
    pub fn add_edge(&mut self, source: Uuid, target: Uuid) -> bool {
        match (self.index.get(&source), self.index.get(&target)) {
            (Some(&s), Some(&t)) => {
                self.outgoing[s].push(t);
                self.incoming[t].push(s);
                self.edge_count += 1;
                true
            }
            _ => {
                self.dropped_edges += 1;
                false
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges
    }

    /// Node ids in index order
    pub fn nodes(&self) -> &[Uuid] {
        &self.nodes
    }

    /// Nodes linked from `node`
    pub fn targets(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    /// Nodes linking to `node`
    pub fn sources(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.outgoing[node].len()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.incoming[node].len()
    }
}
