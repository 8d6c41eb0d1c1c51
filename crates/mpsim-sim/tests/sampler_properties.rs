//! Property tests for the sampler and the parameter generators.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use mpsim_core::{ReportMode, compile_edges};
use mpsim_sim::moran::{StaticFitness, moran_transitions};
use mpsim_sim::params::random_population;
use mpsim_sim::sampler::select_transition;
use mpsim_sim::simulate;

fn arb_cumulative() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0_f64..1.0, 1..16).prop_map(|weights| {
        let total: f64 = weights.iter().sum::<f64>().max(f64::MIN_POSITIVE);
        let mut running = 0.0;
        weights
            .iter()
            .map(|w| {
                running += w / total;
                running
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn selection_stays_in_bounds(cumulative in arb_cumulative(), r in 0.0_f64..1.0) {
        let idx = select_transition(&cumulative, r);
        prop_assert!(idx < cumulative.len());
        if cumulative[idx] < r {
            prop_assert_eq!(idx, cumulative.len() - 1);
        }
        if idx > 0 {
            prop_assert!(cumulative[idx - 1] < r);
        }
    }

    #[test]
    fn trajectories_follow_edges_and_respect_budget(
        n in 2_u32..12,
        fitness in 0.2_f64..5.0,
        seed in any::<u64>(),
        budget in 1_u64..400,
    ) {
        let edges = moran_transitions(n, &StaticFitness::new(fitness));
        let cache = compile_edges::<[u32; 2], _>(edges);
        let start = [1, n - 1];
        let t = simulate(&cache, &start, seed, Some(budget), ReportMode::Full)
            .expect("start state is a vertex");

        prop_assert!(t.length < budget);
        prop_assert_eq!(t.history.len() as u64, t.length + 1);
        prop_assert_eq!(t.history[0], start);
        for pair in t.history.windows(2) {
            let from = cache.index_of(&pair[0]).expect("vertex");
            let to = cache.index_of(&pair[1]).expect("vertex");
            prop_assert!(cache.out_neighbors(from).contains(&to));
        }

        let last = cache.index_of(t.final_state().expect("non-empty")).expect("vertex");
        if t.length + 1 < budget {
            prop_assert!(cache.is_absorbing(last));
        }
    }

    #[test]
    fn short_report_agrees_with_full(n in 2_u32..10, seed in any::<u64>()) {
        let edges = moran_transitions(n, &StaticFitness::new(1.0));
        let cache = compile_edges::<[u32; 2], _>(edges);
        let start = [1, n - 1];
        let full = simulate(&cache, &start, seed, Some(10_000), ReportMode::Full).expect("full");
        let short = simulate(&cache, &start, seed, Some(10_000), ReportMode::Short).expect("short");
        prop_assert_eq!(short.length, full.length);
        prop_assert_eq!(short.history.len(), 2);
        prop_assert_eq!(short.final_state(), full.final_state());
    }

    #[test]
    fn random_populations_sum_to_total(
        total in 0_u32..200,
        minimum in 0_u32..5,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let three: [u32; 3] = random_population(total, minimum, &mut rng);
        prop_assert_eq!(three.iter().sum::<u32>(), total);

        let two: [u32; 2] = random_population(total, minimum, &mut rng);
        prop_assert_eq!(two[0] + two[1], total);
        if total >= 2 * minimum {
            prop_assert!(two[0] >= minimum && two[1] >= minimum);
        }
    }
}
