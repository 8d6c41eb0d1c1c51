//! Single-trajectory sampling over a [`SimulationCache`].
//!
//! Each call seeds its own [`StdRng`] from the caller's seed, so a trajectory
//! depends on `(cache, initial_state, seed, max_steps)` only, never on which
//! worker ran it or in what order.

use std::fmt::Debug;
use std::hash::Hash;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use mpsim_core::{ReportMode, SimError, SimulationCache};

use crate::cancel::CancelToken;

/// How many steps a walk takes between polls of its cancellation token.
pub const CANCEL_POLL_INTERVAL: u64 = 4096;

/// One sampled trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trajectory<V> {
    pub seed: u64,
    /// Number of transitions taken.
    pub length: u64,
    /// Visited states, starting with the initial state. In
    /// [`ReportMode::Short`] only the initial and final states.
    pub history: Vec<V>,
}

impl<V> Trajectory<V> {
    /// Last recorded state.
    #[must_use]
    pub fn final_state(&self) -> Option<&V> {
        self.history.last()
    }
}

/// Pick the first entry of `cumulative` that is `>= r`.
///
/// Ties resolve to the earliest entry. If round-off leaves `r` above the
/// last partial sum, the last entry is chosen.
#[must_use]
pub fn select_transition(cumulative: &[f64], r: f64) -> usize {
    cumulative
        .iter()
        .position(|&c| c >= r)
        .unwrap_or_else(|| cumulative.len().saturating_sub(1))
}

/// Sample one trajectory from `initial_state`.
///
/// The walk stops when the current state is absorbing or when the step
/// counter (starting at 1, advanced once per transition) reaches
/// `max_steps`, so at most `max_steps - 1` transitions are taken. `None`
/// walks until absorption and never returns on a chain without a reachable
/// absorbing state.
///
/// # Errors
///
/// Returns [`SimError::StateNotFound`] if `initial_state` is not a vertex of
/// the cache.
pub fn simulate<V>(
    cache: &SimulationCache<V>,
    initial_state: &V,
    seed: u64,
    max_steps: Option<u64>,
    report: ReportMode,
) -> Result<Trajectory<V>, SimError>
where
    V: Clone + Eq + Hash + Debug,
{
    walk(cache, initial_state, seed, max_steps, report, None)
}

/// [`simulate`], polling `cancel` every [`CANCEL_POLL_INTERVAL`] steps.
///
/// # Errors
///
/// Returns [`SimError::Interrupted`] once `cancel` is observed, plus the
/// errors of [`simulate`].
pub fn simulate_cancellable<V>(
    cache: &SimulationCache<V>,
    initial_state: &V,
    seed: u64,
    max_steps: Option<u64>,
    report: ReportMode,
    cancel: &CancelToken,
) -> Result<Trajectory<V>, SimError>
where
    V: Clone + Eq + Hash + Debug,
{
    walk(cache, initial_state, seed, max_steps, report, Some(cancel))
}

fn walk<V>(
    cache: &SimulationCache<V>,
    initial_state: &V,
    seed: u64,
    max_steps: Option<u64>,
    report: ReportMode,
    cancel: Option<&CancelToken>,
) -> Result<Trajectory<V>, SimError>
where
    V: Clone + Eq + Hash + Debug,
{
    let mut state = cache
        .index_of(initial_state)
        .ok_or_else(|| SimError::StateNotFound(format!("{initial_state:?}")))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let budget = max_steps.unwrap_or(u64::MAX);
    let keep_path = report == ReportMode::Full;
    let mut path = vec![state];
    let mut iteration: u64 = 1;

    while iteration < budget && !cache.is_absorbing(state) {
        if iteration % CANCEL_POLL_INTERVAL == 0 && cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SimError::Interrupted {
                seed,
                steps: iteration - 1,
            });
        }
        let r: f64 = rng.gen_range(0.0..1.0);
        let next = select_transition(cache.cumulative(state), r);
        state = cache.out_neighbors(state)[next];
        if keep_path {
            path.push(state);
        }
        iteration += 1;
    }

    if !keep_path {
        path.push(state);
    }

    let length = iteration - 1;
    trace!(seed, length, "trajectory finished");
    Ok(Trajectory {
        seed,
        length,
        history: path.into_iter().map(|idx| cache.label(idx).clone()).collect(),
    })
}
