use petgraph::algo::{astar, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Direction, DocumentHandle, EdgeRecord};

/// Shortest path result
#[derive(Debug, Clone)]
pub struct ShortestPath {
    pub path: Vec<DocumentHandle>, // vertices in order
    pub edges: Vec<EdgeRecord>,
    pub total_weight: usize,
}

/// In-memory graph over edges already fetched from the store
pub struct EdgeGraph {
    graph: DiGraph<DocumentHandle, usize>,
    node_map: HashMap<DocumentHandle, NodeIndex>,
    edges: Vec<EdgeRecord>,
}

impl EdgeGraph {
    pub fn new(edges: Vec<EdgeRecord>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for (pos, edge) in edges.iter().enumerate() {
            let from = *node_map
                .entry(edge.from.clone())
                .or_insert_with(|| graph.add_node(edge.from.clone()));
            let to = *node_map
                .entry(edge.to.clone())
                .or_insert_with(|| graph.add_node(edge.to.clone()));
            graph.add_edge(from, to, pos);
        }

        Self {
            graph,
            node_map,
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, vertex: &DocumentHandle) -> bool {
        self.node_map.contains_key(vertex)
    }

    /// Vertices adjacent to `vertex` in the given direction, deduplicated
    pub fn neighbors(&self, vertex: &DocumentHandle, direction: Direction) -> Vec<DocumentHandle> {
        let Some(&idx) = self.node_map.get(vertex) else {
            return Vec::new();
        };

        let mut seen = Vec::new();
        let mut push = |n: NodeIndex| {
            let handle = &self.graph[n];
            if !seen.contains(handle) {
                seen.push(handle.clone());
            }
        };

        if matches!(direction, Direction::Out | Direction::Any) {
            for n in self.graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
                push(n);
            }
        }
        if matches!(direction, Direction::In | Direction::Any) {
            for n in self.graph.neighbors_directed(idx, petgraph::Direction::Incoming) {
                push(n);
            }
        }

        seen
    }

    /// Find the shortest directed path between two vertices (unit weights)
    pub fn shortest_path(&self, from: &DocumentHandle, to: &DocumentHandle) -> Option<ShortestPath> {
        let from_idx = *self.node_map.get(from)?;
        let to_idx = *self.node_map.get(to)?;

        let (total_weight, nodes) =
            astar(&self.graph, from_idx, |n| n == to_idx, |_| 1usize, |_| 0)?;

        let edges = nodes
            .windows(2)
            .filter_map(|pair| self.graph.find_edge(pair[0], pair[1]))
            .map(|e| self.edges[self.graph[e]].clone())
            .collect();

        Some(ShortestPath {
            path: nodes.iter().map(|&n| self.graph[n].clone()).collect(),
            edges,
            total_weight,
        })
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Calculate graph statistics
    pub fn statistics(&self) -> GraphStatistics {
        let mut in_degrees = HashMap::new();
        let mut out_degrees = HashMap::new();

        for idx in self.graph.node_indices() {
            let id = self.graph[idx].to_string();
            let in_degree = self
                .graph
                .edges_directed(idx, petgraph::Direction::Incoming)
                .count();
            let out_degree = self
                .graph
                .edges_directed(idx, petgraph::Direction::Outgoing)
                .count();

            in_degrees.insert(id.clone(), in_degree);
            out_degrees.insert(id, out_degree);
        }

        GraphStatistics {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            has_cycles: self.has_cycles(),
            in_degrees,
            out_degrees,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub has_cycles: bool,
    pub in_degrees: HashMap<String, usize>,
    pub out_degrees: HashMap<String, usize>,
}
