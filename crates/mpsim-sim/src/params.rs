//! Generators that feed a batch run.
//!
//! A batch consumes two streams: chunk sizes (how many trajectories per
//! chunk) and [`SimParams`] (one per trajectory). The parameter stream is
//! usually a zip of a constant cache, an initial-state supply and a seed
//! supply; [`parameter_stream`] builds that zip.

use std::iter;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mpsim_core::{ReportMode, SimulationCache};

/// Smallest seed produced by [`SeedStream::random`].
pub const SEED_MIN: u64 = 1;
/// Largest seed produced by [`SeedStream::random`].
pub const SEED_MAX: u64 = 99_999_999_999;

/// Everything one trajectory needs. The cache is shared by every unit in a
/// run.
#[derive(Debug)]
pub struct SimParams<V> {
    pub cache: Arc<SimulationCache<V>>,
    pub initial_state: V,
    pub seed: u64,
    pub max_steps: Option<u64>,
    pub report: ReportMode,
}

impl<V: Clone> Clone for SimParams<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            initial_state: self.initial_state.clone(),
            seed: self.seed,
            max_steps: self.max_steps,
            report: self.report,
        }
    }
}

/// Splits a trajectory count into chunks of at most `per_chunk`.
///
/// The last chunk carries the remainder. [`ChunkSizes::unbounded`] never
/// ends; the run then stops when the parameter stream does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSizes {
    remaining: Option<usize>,
    per_chunk: usize,
}

impl ChunkSizes {
    /// `per_chunk` of zero is treated as one.
    #[must_use]
    pub fn new(total: usize, per_chunk: usize) -> Self {
        Self {
            remaining: Some(total),
            per_chunk: per_chunk.max(1),
        }
    }

    #[must_use]
    pub fn unbounded(per_chunk: usize) -> Self {
        Self {
            remaining: None,
            per_chunk: per_chunk.max(1),
        }
    }
}

impl Iterator for ChunkSizes {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self.remaining.as_mut() {
            None => Some(self.per_chunk),
            Some(0) => None,
            Some(remaining) => {
                let size = self.per_chunk.min(*remaining);
                *remaining -= size;
                Some(size)
            }
        }
    }
}

/// Unbounded supply of per-trajectory seeds.
#[derive(Debug, Clone)]
pub enum SeedStream {
    /// Uniform in `[SEED_MIN, SEED_MAX]`, drawn from a master generator.
    Random(StdRng),
    /// `start, start + 1, ...`, wrapping at `u64::MAX`.
    Sequential(u64),
}

impl SeedStream {
    /// Random seeds from a master generator seeded with `master_seed`.
    #[must_use]
    pub fn random(master_seed: u64) -> Self {
        Self::Random(StdRng::seed_from_u64(master_seed))
    }

    /// Random seeds from an entropy-seeded master generator.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::Random(StdRng::from_entropy())
    }

    #[must_use]
    pub const fn sequential(start: u64) -> Self {
        Self::Sequential(start)
    }
}

impl Iterator for SeedStream {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match self {
            Self::Random(rng) => Some(rng.gen_range(SEED_MIN..=SEED_MAX)),
            Self::Sequential(next) => {
                let seed = *next;
                *next = next.wrapping_add(1);
                Some(seed)
            }
        }
    }
}

/// The same value forever.
pub fn constant<T: Clone>(value: T) -> iter::Repeat<T> {
    iter::repeat(value)
}

/// A random population of `K` types summing to `total`.
///
/// Each of the first `K - 1` counts is drawn uniformly from
/// `[minimum, remaining - minimum]`; the last type takes what is left. When
/// the remainder is too small for that range the count falls back to
/// `minimum` (or whatever remains, if less). `minimum = 1` keeps every type
/// present, avoiding the boundary of the simplex.
pub fn random_population<const K: usize, R: Rng + ?Sized>(
    total: u32,
    minimum: u32,
    rng: &mut R,
) -> [u32; K] {
    let mut population = [0_u32; K];
    let mut remaining = total;
    for slot in population.iter_mut().take(K.saturating_sub(1)) {
        let count = if remaining >= minimum.saturating_mul(2) {
            rng.gen_range(minimum..=remaining - minimum)
        } else {
            minimum.min(remaining)
        };
        remaining -= count;
        *slot = count;
    }
    if let Some(last) = population.last_mut() {
        *last = remaining;
    }
    population
}

/// Unbounded stream of [`random_population`] draws.
#[derive(Debug, Clone)]
pub struct RandomStates<const K: usize> {
    total: u32,
    minimum: u32,
    rng: StdRng,
}

impl<const K: usize> RandomStates<K> {
    /// Populations summing to `total` with every type present.
    #[must_use]
    pub fn new(total: u32, seed: u64) -> Self {
        Self {
            total,
            minimum: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub const fn with_minimum(mut self, minimum: u32) -> Self {
        self.minimum = minimum;
        self
    }
}

impl<const K: usize> Iterator for RandomStates<K> {
    type Item = [u32; K];

    fn next(&mut self) -> Option<[u32; K]> {
        Some(random_population(self.total, self.minimum, &mut self.rng))
    }
}

/// Zip a shared cache with initial-state and seed supplies.
///
/// The stream ends when either supply does.
pub fn parameter_stream<V, S, D>(
    cache: Arc<SimulationCache<V>>,
    initial_states: S,
    seeds: D,
    max_steps: Option<u64>,
    report: ReportMode,
) -> impl Iterator<Item = SimParams<V>>
where
    S: IntoIterator<Item = V>,
    D: IntoIterator<Item = u64>,
{
    initial_states
        .into_iter()
        .zip(seeds)
        .map(move |(initial_state, seed)| SimParams {
            cache: Arc::clone(&cache),
            initial_state,
            seed,
            max_steps,
            report,
        })
}
