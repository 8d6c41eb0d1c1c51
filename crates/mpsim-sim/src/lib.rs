//! mpsim-sim library.
//!
//! Samples trajectories through a compiled
//! [`SimulationCache`](mpsim_core::SimulationCache), runs many of them in
//! parallel chunks, and iterates mass vectors toward a stationary
//! distribution.
//!
//! # Conventions
//!
//! - **Errors**: [`SimError`](mpsim_core::SimError) for sampling and batch
//!   failures; `anyhow::Result` inside callbacks that touch I/O.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod batch;
pub mod callbacks;
pub mod cancel;
pub mod moran;
pub mod params;
pub mod sampler;
pub mod stationary;

pub use batch::{BatchOrchestrator, ChunkCallback};
pub use callbacks::Fanout;
pub use cancel::CancelToken;
pub use params::{ChunkSizes, RandomStates, SeedStream, SimParams, parameter_stream};
pub use sampler::{Trajectory, simulate};
pub use stationary::{Convergence, ConvergenceConfig, PowerIterator, converge};
