//! Ready-made [`ChunkCallback`]s for common aggregations.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::batch::ChunkCallback;
use crate::sampler::Trajectory;

/// Hands every chunk to several callbacks, in the order they were added.
pub struct Fanout<'a, V> {
    targets: Vec<&'a mut dyn ChunkCallback<V>>,
}

impl<'a, V> Fanout<'a, V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            targets: Vec::new(),
        }
    }

    pub fn push(&mut self, callback: &'a mut dyn ChunkCallback<V>) {
        self.targets.push(callback);
    }

    #[must_use]
    pub fn with(mut self, callback: &'a mut dyn ChunkCallback<V>) -> Self {
        self.push(callback);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<V> Default for Fanout<'_, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ChunkCallback<V> for Fanout<'_, V> {
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> Result<()> {
        for target in &mut self.targets {
            target.on_chunk(results)?;
        }
        Ok(())
    }
}

/// Counts the final state of every trajectory.
///
/// With an absorbing chain and a generous step budget these counts estimate
/// absorption probabilities.
#[derive(Debug, Clone)]
pub struct ConvergentsCounter<V> {
    counts: HashMap<V, u64>,
    total: u64,
}

impl<V: Eq + Hash> ConvergentsCounter<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            total: 0,
        }
    }

    #[must_use]
    pub const fn counts(&self) -> &HashMap<V, u64> {
        &self.counts
    }

    #[must_use]
    pub fn count(&self, state: &V) -> u64 {
        self.counts.get(state).copied().unwrap_or(0)
    }

    /// Number of trajectories seen.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Counts divided by the number of trajectories seen.
    #[must_use]
    pub fn distribution(&self) -> HashMap<&V, f64> {
        let total = self.total as f64;
        self.counts
            .iter()
            .map(|(state, &count)| (state, count as f64 / total))
            .collect()
    }
}

impl<V: Eq + Hash> Default for ConvergentsCounter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Eq + Hash> ChunkCallback<V> for ConvergentsCounter<V> {
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> Result<()> {
        for trajectory in results {
            if let Some(last) = trajectory.final_state() {
                *self.counts.entry(last.clone()).or_insert(0) += 1;
                self.total += 1;
            }
        }
        Ok(())
    }
}

/// Keeps only the length of each trajectory.
#[derive(Debug, Clone, Default)]
pub struct RunLengthRecorder {
    lengths: Vec<u64>,
}

impl RunLengthRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lengths(&self) -> &[u64] {
        &self.lengths
    }

    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.lengths.is_empty() {
            return None;
        }
        let sum: f64 = self.lengths.iter().map(|&l| l as f64).sum();
        Some(sum / self.lengths.len() as f64)
    }
}

impl<V> ChunkCallback<V> for RunLengthRecorder {
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> Result<()> {
        self.lengths.extend(results.iter().map(|t| t.length));
        Ok(())
    }
}

/// Occupation counts over every recorded state of every trajectory.
#[derive(Debug, Clone)]
pub struct StateCounter<V> {
    counts: HashMap<V, u64>,
}

impl<V: Eq + Hash> StateCounter<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn counts(&self) -> &HashMap<V, u64> {
        &self.counts
    }

    #[must_use]
    pub fn count(&self, state: &V) -> u64 {
        self.counts.get(state).copied().unwrap_or(0)
    }
}

impl<V: Eq + Hash> Default for StateCounter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Eq + Hash> ChunkCallback<V> for StateCounter<V> {
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> Result<()> {
        for state in results.iter().flat_map(|t| t.history.iter()) {
            *self.counts.entry(state.clone()).or_insert(0) += 1;
        }
        Ok(())
    }
}

/// Writes one JSON object per trajectory, one per line.
///
/// The writer is flushed after every chunk.
#[derive(Debug)]
pub struct ResultsWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> ResultsWriter<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<V: Serialize, W: Write> ChunkCallback<V> for ResultsWriter<W> {
    fn on_chunk(&mut self, results: &[Trajectory<V>]) -> Result<()> {
        for trajectory in results {
            serde_json::to_writer(&mut self.writer, trajectory).with_context(|| {
                format!("Failed to encode trajectory for seed {}", trajectory.seed)
            })?;
            self.writer
                .write_all(b"\n")
                .context("Failed to write trajectory record")?;
            self.written += 1;
        }
        self.writer.flush().context("Failed to flush trajectory records")?;
        Ok(())
    }
}
