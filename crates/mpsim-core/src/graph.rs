//! Directed, weighted multigraph over hashable vertex labels.
//!
//! Edge generators feed `(source, target, weight)` triples into a
//! [`WeightedGraph`]; the caches in [`crate::cache`] then compile it into
//! dense index arrays.
//!
//! # Ordering
//!
//! Every query on this graph is deterministic:
//!
//! - Vertices are ordered by first appearance. Within an edge the source is
//!   registered before the target.
//! - [`WeightedGraph::out_dict`] and [`WeightedGraph::in_dict`] list
//!   neighbors in edge-insertion order.
//! - Repeated `(source, target)` pairs collapse to a single entry at the
//!   position of the first occurrence, carrying the weight of the last one.
//!
//! The sampler resolves ties to the earliest outgoing entry, so this order
//! is observable in simulation output.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A weighted transition between two vertex labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<V> {
    pub source: V,
    pub target: V,
    /// Non-negative transition weight. Need not be normalized.
    pub weight: f64,
}

impl<V> Edge<V> {
    #[must_use]
    pub const fn new(source: V, target: V, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
        }
    }
}

impl<V> From<(V, V, f64)> for Edge<V> {
    fn from((source, target, weight): (V, V, f64)) -> Self {
        Self::new(source, target, weight)
    }
}

/// Edge list plus per-vertex adjacency, indexed by first-appearance order.
#[derive(Debug, Clone)]
pub struct WeightedGraph<V> {
    vertices: Vec<V>,
    index: HashMap<V, usize>,
    edges: Vec<Edge<V>>,
    /// Edge positions sourced at each vertex, in insertion order.
    outgoing: Vec<Vec<usize>>,
    /// Edge positions targeting each vertex, in insertion order.
    incoming: Vec<Vec<usize>>,
}

impl<V> Default for WeightedGraph<V> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }
}

impl<V: Clone + Eq + Hash> WeightedGraph<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an edge sequence.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Edge<V>>,
    {
        let mut graph = Self::new();
        graph.add_edges(edges);
        graph
    }

    /// Register a vertex without edges. Returns its position in vertex order.
    ///
    /// Adding an existing label is a no-op.
    pub fn add_vertex(&mut self, label: V) -> usize {
        if let Some(&idx) = self.index.get(&label) {
            return idx;
        }
        let idx = self.vertices.len();
        self.index.insert(label.clone(), idx);
        self.vertices.push(label);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        idx
    }

    pub fn add_edge(&mut self, source: V, target: V, weight: f64) {
        let s = self.add_vertex(source.clone());
        let t = self.add_vertex(target.clone());
        let pos = self.edges.len();
        self.edges.push(Edge::new(source, target, weight));
        self.outgoing[s].push(pos);
        self.incoming[t].push(pos);
    }

    pub fn add_edges<I>(&mut self, edges: I)
    where
        I: IntoIterator,
        I::Item: Into<Edge<V>>,
    {
        for edge in edges {
            let Edge {
                source,
                target,
                weight,
            } = edge.into();
            self.add_edge(source, target, weight);
        }
    }

    /// All vertex labels in first-appearance order.
    #[must_use]
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge<V>] {
        &self.edges
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn contains(&self, label: &V) -> bool {
        self.index.contains_key(label)
    }

    /// Outgoing `(target, weight)` entries of `source`.
    ///
    /// Empty for unknown labels and for vertices without outgoing edges.
    #[must_use]
    pub fn out_dict(&self, source: &V) -> Vec<(&V, f64)> {
        self.index.get(source).map_or_else(Vec::new, |&idx| {
            collapse(self.outgoing[idx].iter().map(|&pos| {
                let edge = &self.edges[pos];
                (&edge.target, edge.weight)
            }))
        })
    }

    /// Incoming `(source, weight)` entries of `target`.
    #[must_use]
    pub fn in_dict(&self, target: &V) -> Vec<(&V, f64)> {
        self.index.get(target).map_or_else(Vec::new, |&idx| {
            collapse(self.incoming[idx].iter().map(|&pos| {
                let edge = &self.edges[pos];
                (&edge.source, edge.weight)
            }))
        })
    }

    /// True if `label` is a vertex with no outgoing edges.
    #[must_use]
    pub fn is_sink(&self, label: &V) -> bool {
        self.index
            .get(label)
            .is_some_and(|&idx| self.outgoing[idx].is_empty())
    }

    /// Rescale every vertex's outgoing weights to sum to 1.
    ///
    /// The total is taken over the collapsed row that [`Self::out_dict`]
    /// reports, so overwritten duplicates do not count. A vertex whose
    /// outgoing weights sum to zero ends up with NaN weights; that is a
    /// defect in the edge generator and is not masked here.
    pub fn normalize_weights(&mut self) {
        for positions in &self.outgoing {
            let total: f64 = collapse(positions.iter().map(|&pos| {
                let edge = &self.edges[pos];
                (&edge.target, edge.weight)
            }))
            .iter()
            .map(|&(_, weight)| weight)
            .sum();
            for &pos in positions {
                self.edges[pos].weight /= total;
            }
        }
    }
}

/// Collapse repeated keys: first position wins, last weight wins.
fn collapse<'a, V: Eq + 'a>(entries: impl Iterator<Item = (&'a V, f64)>) -> Vec<(&'a V, f64)> {
    let mut out: Vec<(&V, f64)> = Vec::new();
    for (label, weight) in entries {
        if let Some(slot) = out.iter_mut().find(|(existing, _)| *existing == label) {
            slot.1 = weight;
        } else {
            out.push((label, weight));
        }
    }
    out
}
