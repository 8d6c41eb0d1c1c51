//! Edge generators for Moran processes over a fixed population size.
//!
//! States are population vectors: `[a, b]` for two types, `[i, j, k]` for
//! three. Each step one individual is chosen to reproduce in proportion to
//! `count * fitness` and one is chosen uniformly to die. States where a
//! single type has taken over have no outgoing edges and are absorbing.

use mpsim_core::Edge;

/// Per-type fitness for a population vector of `K` types.
pub trait FitnessLandscape<const K: usize> {
    fn fitness(&self, population: &[u32; K]) -> [f64; K];
}

impl<const K: usize, F> FitnessLandscape<K> for F
where
    F: Fn(&[u32; K]) -> [f64; K],
{
    fn fitness(&self, population: &[u32; K]) -> [f64; K] {
        self(population)
    }
}

/// Type A has fitness 1, type B has fitness `r`, independent of the
/// population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticFitness {
    pub relative: f64,
}

impl StaticFitness {
    #[must_use]
    pub const fn new(relative: f64) -> Self {
        Self { relative }
    }
}

impl FitnessLandscape<2> for StaticFitness {
    fn fitness(&self, _population: &[u32; 2]) -> [f64; 2] {
        [1.0, self.relative]
    }
}

/// Fitness from a game matrix: type `i` earns `matrix[i] . population`,
/// averaged over the individuals it meets.
///
/// Without self-interaction an individual does not play itself, so
/// `matrix[i][i]` is subtracted once and the average is over `N - 1`
/// opponents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFitness<const K: usize> {
    pub matrix: [[f64; K]; K],
    pub self_interaction: bool,
}

impl<const K: usize> LinearFitness<K> {
    #[must_use]
    pub const fn new(matrix: [[f64; K]; K]) -> Self {
        Self {
            matrix,
            self_interaction: false,
        }
    }

    #[must_use]
    pub const fn with_self_interaction(mut self, enabled: bool) -> Self {
        self.self_interaction = enabled;
        self
    }
}

impl<const K: usize> FitnessLandscape<K> for LinearFitness<K> {
    fn fitness(&self, population: &[u32; K]) -> [f64; K] {
        let n: f64 = population.iter().map(|&c| f64::from(c)).sum();
        let opponents = if self.self_interaction { n } else { n - 1.0 };
        let mut out = [0.0; K];
        for (i, (slot, row)) in out.iter_mut().zip(&self.matrix).enumerate() {
            let mut payoff: f64 = row
                .iter()
                .zip(population)
                .map(|(m, &c)| m * f64::from(c))
                .sum();
            if !self.self_interaction {
                payoff -= row[i];
            }
            *slot = payoff / opponents;
        }
        out
    }
}

/// `exp(beta * f)` applied to another landscape.
///
/// Keeps every fitness positive, which avoids a zero total fitness when
/// payoffs can be negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fermi<L> {
    pub inner: L,
    pub beta: f64,
}

impl<L> Fermi<L> {
    pub const fn new(inner: L, beta: f64) -> Self {
        Self { inner, beta }
    }
}

impl<const K: usize, L: FitnessLandscape<K>> FitnessLandscape<K> for Fermi<L> {
    fn fitness(&self, population: &[u32; K]) -> [f64; K] {
        self.inner.fitness(population).map(|f| (self.beta * f).exp())
    }
}

/// Rock-scissors-paper payoffs: `a` for a win, `-b` for a loss.
#[must_use]
pub const fn rock_scissors_paper(a: f64, b: f64) -> [[f64; 3]; 3] {
    [[0.0, -b, a], [a, 0.0, -b], [-b, a, 0.0]]
}

/// Transitions of the two-type Moran process with population `n`.
///
/// For every interior state `[a, n - a]` emits, in order, the move to
/// `[a + 1, n - a - 1]`, the move to `[a - 1, n - a + 1]` and the self-loop.
/// `[0, n]` and `[n, 0]` only appear as targets.
pub fn moran_transitions<L>(n: u32, landscape: &L) -> Vec<Edge<[u32; 2]>>
where
    L: FitnessLandscape<2> + ?Sized,
{
    let total = f64::from(n);
    let mut edges = Vec::with_capacity(3 * n.saturating_sub(1) as usize);
    for a in 1..n {
        let b = n - a;
        let state = [a, b];
        let [fa, fb] = landscape.fitness(&state);
        let (wa, wb) = (f64::from(a) * fa, f64::from(b) * fb);
        let weight = wa + wb;
        let up = wa / weight * f64::from(b) / total;
        let down = wb / weight * f64::from(a) / total;
        edges.push(Edge::new(state, [a + 1, b - 1], up));
        edges.push(Edge::new(state, [a - 1, b + 1], down));
        edges.push(Edge::new(state, state, 1.0 - up - down));
    }
    edges
}

/// Transitions of the three-type Moran process with population `n`.
///
/// Interior states get all six single-replacement moves; states on an edge
/// of the simplex (one type extinct) only move between the two surviving
/// types. Every source also gets a self-loop with the remaining mass. The
/// three corner states are absorbing.
pub fn multivariate_moran_transitions<L>(n: u32, landscape: &L) -> Vec<Edge<[u32; 3]>>
where
    L: FitnessLandscape<3> + ?Sized,
{
    const MOVES: [(usize, usize); 6] = [(1, 2), (2, 1), (0, 2), (2, 0), (0, 1), (1, 0)];

    let total = f64::from(n);
    let mut edges = Vec::new();
    for i in 0..=n {
        for j in 0..=(n - i) {
            let k = n - i - j;
            let state = [i, j, k];
            if state.contains(&n) {
                continue;
            }

            let fitness = landscape.fitness(&state);
            let weight: f64 = state
                .iter()
                .zip(fitness)
                .map(|(&c, f)| f64::from(c) * f)
                .sum();

            let mut leaving = 0.0;
            // (born, dies): one copy of `born` replaces one of `dies`.
            for (born, dies) in MOVES {
                if state[born] == 0 || state[dies] == 0 {
                    continue;
                }
                let mut target = state;
                target[born] += 1;
                target[dies] -= 1;
                let p = f64::from(state[born]) * fitness[born] / weight * f64::from(state[dies])
                    / total;
                leaving += p;
                edges.push(Edge::new(state, target, p));
            }
            edges.push(Edge::new(state, state, 1.0 - leaving));
        }
    }
    edges
}
