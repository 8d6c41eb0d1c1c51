use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mpsim_core::{ReportMode, SimError, compile_edges};
use mpsim_sim::callbacks::{ConvergentsCounter, RunLengthRecorder};
use mpsim_sim::params::constant;
use mpsim_sim::{BatchOrchestrator, ChunkSizes, Fanout, SeedStream, Trajectory, parameter_stream};

fn absorbing_walk() -> Arc<mpsim_core::SimulationCache<i32>> {
    // Random walk on 0..=6 absorbed at both ends.
    let mut edges = Vec::new();
    for x in 1..6 {
        edges.push((x, x + 1, 0.5));
        edges.push((x, x - 1, 0.5));
    }
    Arc::new(compile_edges(edges))
}

#[test]
fn every_parameter_becomes_exactly_one_record() {
    let cache = absorbing_walk();
    let params = parameter_stream(
        Arc::clone(&cache),
        constant(3),
        SeedStream::random(2024),
        None,
        ReportMode::Short,
    );

    let mut chunk_sizes = Vec::new();
    let mut seeds = Vec::new();
    let mut callback = |results: &[Trajectory<i32>]| -> anyhow::Result<()> {
        chunk_sizes.push(results.len());
        seeds.extend(results.iter().map(|t| t.seed));
        Ok(())
    };

    BatchOrchestrator::new()
        .with_workers(Some(4))
        .stream(params, ChunkSizes::new(1000, 100), &mut callback)
        .expect("batch run");

    assert_eq!(chunk_sizes, vec![100; 10]);
    assert_eq!(seeds.len(), 1000);
    let distinct: HashSet<u64> = seeds.iter().copied().collect();
    assert_eq!(distinct.len(), 1000);

    // Same master seed, same seed sequence, regardless of scheduling.
    let expected: Vec<u64> = SeedStream::random(2024).take(1000).collect();
    let mut sorted = seeds.clone();
    sorted.sort_unstable();
    let mut expected_sorted = expected;
    expected_sorted.sort_unstable();
    assert_eq!(sorted, expected_sorted);
}

#[test]
fn streamed_and_collected_runs_agree() {
    let cache = absorbing_walk();
    let make = || {
        parameter_stream(
            Arc::clone(&cache),
            constant(2),
            SeedStream::sequential(1),
            Some(1_000),
            ReportMode::Full,
        )
    };

    let mut collected = BatchOrchestrator::new()
        .with_workers(Some(3))
        .collect(make(), ChunkSizes::new(300, 64))
        .expect("collect");
    assert_eq!(collected.len(), 300);

    let mut streamed = Vec::new();
    let mut callback = |results: &[Trajectory<i32>]| -> anyhow::Result<()> {
        streamed.extend_from_slice(results);
        Ok(())
    };
    BatchOrchestrator::new()
        .with_workers(Some(1))
        .stream(make(), ChunkSizes::new(300, 50), &mut callback)
        .expect("stream");

    collected.sort_by_key(|t| t.seed);
    streamed.sort_by_key(|t| t.seed);
    assert_eq!(collected, streamed);
    assert!(collected.iter().all(|t| matches!(t.history.last(), Some(0 | 6))));
}

#[test]
fn fanout_aggregates_alongside_each_other() {
    let cache = absorbing_walk();
    let params = parameter_stream(
        Arc::clone(&cache),
        constant(3),
        SeedStream::sequential(500),
        None,
        ReportMode::Short,
    );

    let mut counter: ConvergentsCounter<i32> = ConvergentsCounter::new();
    let mut lengths = RunLengthRecorder::new();
    {
        let mut fanout = Fanout::<i32>::new().with(&mut counter).with(&mut lengths);
        BatchOrchestrator::new()
            .stream(params, ChunkSizes::new(400, 100), &mut fanout)
            .expect("batch run");
    }

    assert_eq!(counter.total(), 400);
    assert_eq!(counter.count(&0) + counter.count(&6), 400);
    assert_eq!(lengths.lengths().len(), 400);
    // A symmetric walk from 3 on 0..=6 takes 9 steps on average.
    let mean = lengths.mean().expect("mean");
    assert!((5.0..14.0).contains(&mean), "mean run length {mean}");
}

#[test]
fn cancellation_stops_a_run_that_would_never_finish() {
    // Two states that swap forever; no budget.
    let cache = Arc::new(compile_edges([("ping", "pong", 1.0), ("pong", "ping", 1.0)]));
    let params = parameter_stream(
        cache,
        constant("ping"),
        SeedStream::sequential(1),
        None,
        ReportMode::Short,
    );

    let batch = BatchOrchestrator::new().with_workers(Some(2));
    let watchdog = batch.cancel_token().cancel_after(Duration::from_millis(50));

    let err = batch
        .collect(params, ChunkSizes::new(4, 2))
        .expect_err("run is cancelled");
    assert!(matches!(err, SimError::Cancelled { chunk: 0 }));
    watchdog.join().expect("watchdog");
}
