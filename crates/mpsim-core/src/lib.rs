//! mpsim-core library.
//!
//! Transition graphs over population states and the dense caches compiled
//! from them. Everything here is built once and then shared read-only by
//! the simulation workers in `mpsim-sim`.
//!
//! # Conventions
//!
//! - **Errors**: [`SimError`] for simulation preconditions and batch
//!   failures; `anyhow::Result` for I/O-facing code (config, persistence).
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;

pub use cache::{CacheKey, CacheStore, SimulationCache, StationaryCache, compile_edges};
pub use config::{ReportMode, RunConfig};
pub use error::{ErrorCode, SimError};
pub use graph::{Edge, WeightedGraph};
