//! Chunked parallel execution of many trajectories.
//!
//! A run pulls one chunk size at a time, draws exactly that many
//! [`SimParams`] from the parameter stream, samples them on a fresh rayon
//! pool, and hands the chunk to a [`ChunkCallback`] (or keeps it, if there is
//! none) before asking for the next chunk. At most one chunk of parameters
//! and results is alive at a time.

use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use mpsim_core::SimError;

use crate::cancel::CancelToken;
use crate::params::SimParams;
use crate::sampler::{Trajectory, simulate_cancellable};

/// Receives each completed chunk, in chunk order.
///
/// Result order inside a chunk follows parameter order, but callers should
/// not depend on it.
pub trait ChunkCallback<V> {
    /// # Errors
    ///
    /// An error aborts the run with [`SimError::Callback`].
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> anyhow::Result<()>;
}

impl<V, F> ChunkCallback<V> for F
where
    F: FnMut(&[Trajectory<V>]) -> anyhow::Result<()>,
{
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> anyhow::Result<()> {
        self(results)
    }
}

/// Runs parameter streams chunk by chunk on per-chunk worker pools.
#[derive(Debug, Clone, Default)]
pub struct BatchOrchestrator {
    workers: Option<usize>,
    cancel: CancelToken,
}

impl BatchOrchestrator {
    /// Orchestrator sized to the machine's available parallelism.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the worker count per chunk. Zero falls back to the default.
    #[must_use]
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers.filter(|&n| n > 0);
        self
    }

    /// Share `token` so another thread can stop the run.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get))
    }

    /// Run every chunk and return all trajectories.
    ///
    /// # Errors
    ///
    /// See [`BatchOrchestrator::run`].
    pub fn collect<V, P, C>(
        &self,
        params: P,
        chunk_sizes: C,
    ) -> Result<Vec<Trajectory<V>>, SimError>
    where
        V: Clone + Eq + Hash + Debug + Send + Sync,
        P: IntoIterator<Item = SimParams<V>>,
        C: IntoIterator<Item = usize>,
    {
        Ok(self.run(params, chunk_sizes, None)?.unwrap_or_default())
    }

    /// Run every chunk, handing each to `callback` instead of keeping it.
    ///
    /// # Errors
    ///
    /// See [`BatchOrchestrator::run`].
    pub fn stream<V, P, C, K>(
        &self,
        params: P,
        chunk_sizes: C,
        callback: &mut K,
    ) -> Result<(), SimError>
    where
        V: Clone + Eq + Hash + Debug + Send + Sync,
        P: IntoIterator<Item = SimParams<V>>,
        C: IntoIterator<Item = usize>,
        K: ChunkCallback<V>,
    {
        self.run(params, chunk_sizes, Some(callback as &mut dyn ChunkCallback<V>))
            .map(|_| ())
    }

    /// Execute the run.
    ///
    /// Returns `Some(all results)` when no callback is given and `None`
    /// otherwise. The run ends when `chunk_sizes` is exhausted or the
    /// parameter stream runs dry; a chunk cut short by the latter is still
    /// processed.
    ///
    /// # Errors
    ///
    /// - [`SimError::Cancelled`] if the cancel token fires. Remaining chunks
    ///   are not started and the interrupted chunk is not delivered.
    /// - [`SimError::UnitFailed`] naming the chunk and seed of a failed
    ///   trajectory.
    /// - [`SimError::Callback`] if the callback rejects a chunk.
    /// - [`SimError::WorkerPool`] if a pool cannot be built.
    #[instrument(skip_all, fields(workers = self.worker_count()))]
    pub fn run<V, P, C>(
        &self,
        params: P,
        chunk_sizes: C,
        mut callback: Option<&mut dyn ChunkCallback<V>>,
    ) -> Result<Option<Vec<Trajectory<V>>>, SimError>
    where
        V: Clone + Eq + Hash + Debug + Send + Sync,
        P: IntoIterator<Item = SimParams<V>>,
        C: IntoIterator<Item = usize>,
    {
        let workers = self.worker_count();
        let streaming = callback.is_some();
        let mut params = params.into_iter();
        let mut accumulated = Vec::new();
        let mut total = 0_usize;
        let started = Instant::now();

        info!(workers, streaming, "starting batch run");

        for (chunk, size) in chunk_sizes.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SimError::Cancelled { chunk });
            }
            if size == 0 {
                continue;
            }

            let batch: Vec<SimParams<V>> = params.by_ref().take(size).collect();
            if batch.is_empty() {
                debug!(chunk, "parameter stream exhausted");
                break;
            }
            let exhausted = batch.len() < size;
            if exhausted {
                warn!(
                    chunk,
                    requested = size,
                    drawn = batch.len(),
                    "parameter stream ran dry mid-chunk"
                );
            }

            let chunk_started = Instant::now();
            let results = self.run_chunk(chunk, workers, batch)?;
            if self.cancel.is_cancelled() {
                return Err(SimError::Cancelled { chunk });
            }
            total += results.len();
            debug!(
                chunk,
                trajectories = results.len(),
                elapsed_ms = chunk_started.elapsed().as_millis(),
                "chunk complete"
            );

            if let Some(cb) = callback.as_mut() {
                cb.on_chunk(&results).map_err(|e| SimError::Callback {
                    chunk,
                    reason: format!("{e:#}"),
                })?;
            } else {
                accumulated.extend(results);
            }

            if exhausted {
                break;
            }
        }

        info!(
            trajectories = total,
            elapsed_ms = started.elapsed().as_millis(),
            "batch run finished"
        );
        Ok((!streaming).then_some(accumulated))
    }

    fn run_chunk<V>(
        &self,
        chunk: usize,
        workers: usize,
        batch: Vec<SimParams<V>>,
    ) -> Result<Vec<Trajectory<V>>, SimError>
    where
        V: Clone + Eq + Hash + Debug + Send + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("mpsim-{chunk}-{i}"))
            .build()
            .map_err(|e| SimError::WorkerPool(e.to_string()))?;

        // Tripped by the first failing unit so its in-flight siblings stop
        // at their next poll.
        let halt = self.cancel.child();
        let outcomes: Vec<Result<Trajectory<V>, SimError>> = pool.install(|| {
            batch
                .into_par_iter()
                .map(|unit| {
                    let outcome = run_unit(chunk, &unit, &halt);
                    if outcome.as_ref().is_err_and(|e| !e.is_cancelled()) {
                        halt.cancel();
                    }
                    outcome
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut cancelled = None;
        for outcome in outcomes {
            match outcome {
                Ok(trajectory) => results.push(trajectory),
                Err(e) if e.is_cancelled() => cancelled = Some(e),
                Err(e) => return Err(e),
            }
        }
        cancelled.map_or(Ok(results), Err)
    }
}

fn run_unit<V>(
    chunk: usize,
    unit: &SimParams<V>,
    cancel: &CancelToken,
) -> Result<Trajectory<V>, SimError>
where
    V: Clone + Eq + Hash + Debug,
{
    if cancel.is_cancelled() {
        return Err(SimError::Cancelled { chunk });
    }
    simulate_cancellable(
        &unit.cache,
        &unit.initial_state,
        unit.seed,
        unit.max_steps,
        unit.report,
        cancel,
    )
    .map_err(|source| match source {
        SimError::Interrupted { .. } => SimError::Cancelled { chunk },
        source => SimError::UnitFailed {
            chunk,
            seed: unit.seed,
            source: Box::new(source),
        },
    })
}
