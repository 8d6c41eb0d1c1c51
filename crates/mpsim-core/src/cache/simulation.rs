//! Dense, read-only compilation of a [`WeightedGraph`] for trajectory sampling.
//!
//! Labels are only touched at the edges of a simulation: the sampler maps
//! the initial label to an index, walks integer indices through
//! [`SimulationCache::cumulative`] and [`SimulationCache::out_neighbors`],
//! and maps the history back to labels at the end.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::WeightedGraph;

/// Compiled transition structure shared by every sampling worker.
///
/// Per vertex index `i`:
///
/// - `cumulative(i)` holds running sums of the normalized outgoing weights,
///   in the graph's out-edge order, ending at ≈ 1.0.
/// - `out_neighbors(i)` holds the destination index of each entry in
///   `cumulative(i)`.
/// - `is_absorbing(i)` is true iff the vertex has no outgoing edges, in which
///   case both arrays are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "StoredCache<V>",
    into = "StoredCache<V>",
    bound(
        serialize = "V: Serialize + Clone",
        deserialize = "V: Deserialize<'de> + Clone + Eq + Hash"
    )
)]
pub struct SimulationCache<V> {
    enumeration: HashMap<V, usize>,
    labels: Vec<V>,
    cumulative: Vec<Vec<f64>>,
    out_neighbors: Vec<Vec<usize>>,
    absorbing: Vec<bool>,
}

impl<V: Clone + Eq + Hash> SimulationCache<V> {
    /// Compile `graph` into dense arrays.
    ///
    /// Deterministic for a given graph: vertex indices follow
    /// [`WeightedGraph::vertices`] and each vertex's entries follow
    /// [`WeightedGraph::out_dict`].
    #[must_use]
    #[instrument(skip(graph), fields(vertices = graph.vertex_count(), edges = graph.edge_count()))]
    pub fn compile(graph: &WeightedGraph<V>) -> Self {
        let labels = graph.vertices().to_vec();
        let enumeration = enumerate(&labels);

        let mut cumulative = Vec::with_capacity(labels.len());
        let mut out_neighbors = Vec::with_capacity(labels.len());
        let mut absorbing = Vec::with_capacity(labels.len());

        for label in &labels {
            let out = graph.out_dict(label);
            if out.is_empty() {
                cumulative.push(Vec::new());
                out_neighbors.push(Vec::new());
                absorbing.push(true);
                continue;
            }

            let total: f64 = out.iter().map(|(_, w)| w).sum();
            let mut running = 0.0;
            let mut sums = Vec::with_capacity(out.len());
            let mut targets = Vec::with_capacity(out.len());
            for (target, weight) in out {
                running += weight / total;
                sums.push(running);
                targets.push(enumeration[target]);
            }
            cumulative.push(sums);
            out_neighbors.push(targets);
            absorbing.push(false);
        }

        let cache = Self {
            enumeration,
            labels,
            cumulative,
            out_neighbors,
            absorbing,
        };
        debug!(
            absorbing = cache.absorbing.iter().filter(|a| **a).count(),
            "compiled simulation cache"
        );
        cache
    }

    /// Dense index of `label`, if it is a vertex of the compiled graph.
    #[must_use]
    pub fn index_of(&self, label: &V) -> Option<usize> {
        self.enumeration.get(label).copied()
    }

    /// Label → index bijection.
    #[must_use]
    pub const fn enumeration(&self) -> &HashMap<V, usize> {
        &self.enumeration
    }
}

impl<V> SimulationCache<V> {
    /// Label at dense index `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn label(&self, index: usize) -> &V {
        &self.labels[index]
    }

    /// Index → label inverse of the enumeration.
    #[must_use]
    pub fn labels(&self) -> &[V] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn cumulative(&self, index: usize) -> &[f64] {
        &self.cumulative[index]
    }

    #[must_use]
    pub fn out_neighbors(&self, index: usize) -> &[usize] {
        &self.out_neighbors[index]
    }

    #[must_use]
    pub fn is_absorbing(&self, index: usize) -> bool {
        self.absorbing[index]
    }

    #[must_use]
    pub fn absorbing(&self) -> &[bool] {
        &self.absorbing
    }
}

impl<V: PartialEq> PartialEq for SimulationCache<V> {
    // The enumeration is derived from `labels`, so comparing labels covers it.
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
            && self.cumulative == other.cumulative
            && self.out_neighbors == other.out_neighbors
            && self.absorbing == other.absorbing
    }
}

fn enumerate<V: Clone + Eq + Hash>(labels: &[V]) -> HashMap<V, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.clone(), idx))
        .collect()
}

/// On-disk form: the dense arrays without the derived enumeration map.
#[derive(Serialize, Deserialize)]
pub struct StoredCache<V> {
    labels: Vec<V>,
    cumulative: Vec<Vec<f64>>,
    out_neighbors: Vec<Vec<usize>>,
    absorbing: Vec<bool>,
}

impl<V> From<SimulationCache<V>> for StoredCache<V> {
    fn from(cache: SimulationCache<V>) -> Self {
        Self {
            labels: cache.labels,
            cumulative: cache.cumulative,
            out_neighbors: cache.out_neighbors,
            absorbing: cache.absorbing,
        }
    }
}

impl<V: Clone + Eq + Hash> TryFrom<StoredCache<V>> for SimulationCache<V> {
    type Error = String;

    fn try_from(repr: StoredCache<V>) -> Result<Self, Self::Error> {
        let n = repr.labels.len();
        if repr.cumulative.len() != n || repr.out_neighbors.len() != n || repr.absorbing.len() != n
        {
            return Err(format!(
                "array lengths disagree: labels={n} cumulative={} out_neighbors={} absorbing={}",
                repr.cumulative.len(),
                repr.out_neighbors.len(),
                repr.absorbing.len()
            ));
        }
        for (idx, (sums, targets)) in repr.cumulative.iter().zip(&repr.out_neighbors).enumerate() {
            if sums.len() != targets.len() {
                return Err(format!("vertex {idx}: cumulative and out_neighbors differ in length"));
            }
            if sums.is_empty() != repr.absorbing[idx] {
                return Err(format!("vertex {idx}: absorbing flag disagrees with its edges"));
            }
            if let Some(bad) = targets.iter().find(|&&t| t >= n) {
                return Err(format!("vertex {idx}: neighbor index {bad} out of range"));
            }
        }

        let enumeration = enumerate(&repr.labels);
        if enumeration.len() != n {
            return Err("duplicate vertex labels".to_string());
        }

        Ok(Self {
            enumeration,
            labels: repr.labels,
            cumulative: repr.cumulative,
            out_neighbors: repr.out_neighbors,
            absorbing: repr.absorbing,
        })
    }
}
