use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mpsim_core::{ReportMode, SimulationCache, compile_edges};
use mpsim_sim::moran::{StaticFitness, moran_transitions};
use mpsim_sim::params::constant;
use mpsim_sim::{BatchOrchestrator, ChunkSizes, SeedStream, parameter_stream, simulate};

const POPULATIONS: [u32; 3] = [10, 50, 200];

fn moran_cache(n: u32) -> SimulationCache<[u32; 2]> {
    compile_edges(moran_transitions(n, &StaticFitness::new(1.1)))
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler.simulate");

    for n in POPULATIONS {
        let cache = moran_cache(n);
        let start = [n / 2, n - n / 2];
        group.bench_with_input(BenchmarkId::new("short", n), &cache, |b, cache| {
            let mut seed = 0_u64;
            b.iter(|| {
                seed += 1;
                black_box(simulate(cache, &start, seed, None, ReportMode::Short))
            });
        });
        group.bench_with_input(BenchmarkId::new("full", n), &cache, |b, cache| {
            let mut seed = 0_u64;
            b.iter(|| {
                seed += 1;
                black_box(simulate(cache, &start, seed, None, ReportMode::Full))
            });
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache.compile");
    for n in POPULATIONS {
        let edges = moran_transitions(n, &StaticFitness::new(1.1));
        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &edges, |b, edges| {
            b.iter(|| black_box(compile_edges::<[u32; 2], _>(edges.iter().cloned())));
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let cache = Arc::new(moran_cache(50));
    let batch = BatchOrchestrator::new();
    let mut group = c.benchmark_group("batch.collect");
    group.throughput(Throughput::Elements(1_000));
    group.sample_size(20);
    group.bench_function("moran50_x1000", |b| {
        b.iter(|| {
            let params = parameter_stream(
                Arc::clone(&cache),
                constant([25, 25]),
                SeedStream::sequential(1),
                None,
                ReportMode::Short,
            );
            black_box(batch.collect(params, ChunkSizes::new(1_000, 250)))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_simulate, bench_compile, bench_batch);
criterion_main!(benches);
