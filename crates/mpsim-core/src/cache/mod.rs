//! Compiled caches over a [`WeightedGraph`](crate::graph::WeightedGraph).
//!
//! # Module layout
//!
//! - [`simulation`]: [`SimulationCache`], forward out-neighbor arrays for sampling.
//! - [`stationary`]: [`StationaryCache`], reversed in-neighbor lists for power iteration.
//! - [`store`]: [`CacheStore`], JSON persistence keyed by content hash, timestamp, or name.

pub mod simulation;
pub mod stationary;
pub mod store;

use std::hash::Hash;

pub use simulation::{SimulationCache, StoredCache};
pub use stationary::StationaryCache;
pub use store::{CacheKey, CacheStore};

use crate::graph::{Edge, WeightedGraph};

/// Build a graph from `edges` and compile it for sampling.
///
/// No pre-normalization is needed: compilation divides each vertex's
/// outgoing weights by their sum.
pub fn compile_edges<V, I>(edges: I) -> SimulationCache<V>
where
    V: Clone + Eq + Hash,
    I: IntoIterator,
    I::Item: Into<Edge<V>>,
{
    let graph = WeightedGraph::from_edges(edges);
    tracing::info!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "compiling graph"
    );
    SimulationCache::compile(&graph)
}
