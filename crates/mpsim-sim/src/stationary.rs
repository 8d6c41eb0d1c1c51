//! Power iteration toward a stationary distribution.
//!
//! [`PowerIterator`] yields successive mass vectors forever; callers stop it
//! with `take`, `step_by`, or [`converge`].
//!
//! Absorbing vertices have no outgoing edges, so mass that reaches them
//! leaves the vector on the next step. Give such states a weight-1 self-loop
//! to hold their mass instead.

use tracing::{debug, instrument};

use mpsim_core::{SimError, StationaryCache};

/// Lazy sequence of mass vectors under repeated left-multiplication by the
/// transition matrix.
pub struct PowerIterator<'a, V> {
    cache: &'a StationaryCache<V>,
    initial: Vec<f64>,
    mass: Vec<f64>,
}

impl<'a, V> PowerIterator<'a, V> {
    /// Start from `initial`, or the uniform distribution when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DistributionMismatch`] if `initial` does not have
    /// one entry per vertex.
    pub fn new(cache: &'a StationaryCache<V>, initial: Option<Vec<f64>>) -> Result<Self, SimError> {
        let initial = match initial {
            Some(mass) if mass.len() != cache.len() => {
                return Err(SimError::DistributionMismatch {
                    expected: cache.len(),
                    actual: mass.len(),
                });
            }
            Some(mass) => mass,
            None => uniform(cache.len()),
        };
        Ok(Self {
            cache,
            mass: initial.clone(),
            initial,
        })
    }

    /// The most recently yielded vector, or the start vector before the
    /// first step.
    #[must_use]
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    /// Rewind to the start vector.
    pub fn restart(&mut self) {
        self.mass.clone_from(&self.initial);
    }
}

impl<V> Clone for PowerIterator<'_, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache,
            initial: self.initial.clone(),
            mass: self.mass.clone(),
        }
    }
}

impl<V> Iterator for PowerIterator<'_, V> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        let next: Vec<f64> = (0..self.cache.len())
            .map(|target| {
                self.cache
                    .in_neighbors(target)
                    .iter()
                    .map(|&(source, weight)| weight * self.mass[source])
                    .sum()
            })
            .collect();
        self.mass.clone_from(&next);
        Some(next)
    }
}

fn uniform(len: usize) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }
    vec![1.0 / len as f64; len]
}

/// Stopping rule for [`converge`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceConfig {
    /// Stop once the L1 distance between successive vectors is at most this.
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iter: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub distribution: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// L1 distance covered by the last step taken.
    pub delta: f64,
}

/// Iterate until successive vectors are within `config.tolerance` or
/// `config.max_iter` steps have been taken.
///
/// # Errors
///
/// Returns [`SimError::DistributionMismatch`] if `initial` has the wrong
/// length.
#[instrument(skip(cache, initial), fields(vertices = cache.len()))]
pub fn converge<V>(
    cache: &StationaryCache<V>,
    initial: Option<Vec<f64>>,
    config: &ConvergenceConfig,
) -> Result<Convergence, SimError> {
    let mut iter = PowerIterator::new(cache, initial)?;
    let mut previous = iter.mass().to_vec();
    let mut delta = f64::INFINITY;

    for iteration in 1..=config.max_iter {
        let Some(next) = iter.next() else { break };
        delta = l1_distance(&previous, &next);
        if delta <= config.tolerance {
            debug!(iterations = iteration, delta, "power iteration converged");
            return Ok(Convergence {
                distribution: next,
                iterations: iteration,
                converged: true,
                delta,
            });
        }
        previous = next;
    }

    debug!(iterations = config.max_iter, delta, "power iteration hit max_iter");
    Ok(Convergence {
        distribution: previous,
        iterations: config.max_iter,
        converged: false,
        delta,
    })
}

fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}
