//! Reversed-edge cache for stationary-distribution power iteration.
//!
//! Where [`SimulationCache`](super::SimulationCache) indexes out-neighbors
//! for forward sampling, [`StationaryCache`] indexes in-neighbors so that one
//! step of power iteration is a gather: every vertex sums
//! `weight * mass[source]` over its incoming edges.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::{debug, instrument};

use crate::graph::{Edge, WeightedGraph};

#[derive(Debug, Clone)]
pub struct StationaryCache<V> {
    enumeration: HashMap<V, usize>,
    labels: Vec<V>,
    /// `(source index, weight)` for every edge targeting each vertex.
    in_neighbors: Vec<Vec<(usize, f64)>>,
    /// Indices of vertices without outgoing edges, ascending.
    terminals: Vec<usize>,
}

impl<V: Clone + Eq + Hash> StationaryCache<V> {
    /// Index the in-neighbors of `graph`.
    ///
    /// Weights are used as given; call
    /// [`WeightedGraph::normalize_weights`] first so every row sums to 1.
    #[must_use]
    #[instrument(skip(graph), fields(vertices = graph.vertex_count()))]
    pub fn build(graph: &WeightedGraph<V>) -> Self {
        let labels = graph.vertices().to_vec();
        let enumeration: HashMap<V, usize> = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx))
            .collect();

        let terminals: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| graph.is_sink(label))
            .map(|(idx, _)| idx)
            .collect();

        let in_neighbors = labels
            .iter()
            .map(|label| {
                graph
                    .in_dict(label)
                    .into_iter()
                    .map(|(source, weight)| (enumeration[source], weight))
                    .collect()
            })
            .collect();

        debug!(terminals = terminals.len(), "built stationary cache");
        Self {
            enumeration,
            labels,
            in_neighbors,
            terminals,
        }
    }

    /// Build from raw edges, normalizing outgoing weights first.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Edge<V>>,
    {
        let mut graph = WeightedGraph::from_edges(edges);
        graph.normalize_weights();
        Self::build(&graph)
    }

    #[must_use]
    pub fn index_of(&self, label: &V) -> Option<usize> {
        self.enumeration.get(label).copied()
    }

    /// A point mass on `label`, or `None` if it is not a vertex.
    #[must_use]
    pub fn point_mass(&self, label: &V) -> Option<Vec<f64>> {
        let idx = self.index_of(label)?;
        let mut mass = vec![0.0; self.labels.len()];
        mass[idx] = 1.0;
        Some(mass)
    }
}

impl<V> StationaryCache<V> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[V] {
        &self.labels
    }

    #[must_use]
    pub fn in_neighbors(&self, index: usize) -> &[(usize, f64)] {
        &self.in_neighbors[index]
    }

    #[must_use]
    pub fn terminals(&self) -> &[usize] {
        &self.terminals
    }

    /// Pair each label with its entry in `mass`.
    #[must_use]
    pub fn labelled<'a>(&'a self, mass: &[f64]) -> Vec<(&'a V, f64)> {
        self.labels.iter().zip(mass.iter().copied()).collect()
    }
}
