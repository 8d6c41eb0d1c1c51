//! `mpsim fixation`: batch-simulate the two-type Moran process.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use tracing::info;

use mpsim_core::config::resolve_config;
use mpsim_core::{ReportMode, RunConfig, SimulationCache, compile_edges};
use mpsim_sim::callbacks::{ConvergentsCounter, ResultsWriter, RunLengthRecorder};
use mpsim_sim::moran::{StaticFitness, moran_transitions};
use mpsim_sim::params::constant;
use mpsim_sim::{BatchOrchestrator, ChunkSizes, Fanout, SeedStream, parameter_stream};

use super::{StoreArgs, format_state};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct FixationArgs {
    /// Population size.
    #[arg(short = 'n', long, default_value = "10")]
    pub population: u32,

    /// Initial number of type-A individuals.
    #[arg(long, default_value = "1")]
    pub start: u32,

    /// Fitness of type B relative to type A.
    #[arg(short = 'r', long, default_value = "1.0")]
    pub fitness: f64,

    /// Number of trajectories to simulate.
    #[arg(short = 't', long, default_value = "1000")]
    pub trajectories: usize,

    /// Trajectories per chunk. Overrides mpsim.toml.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Worker threads per chunk. Overrides mpsim.toml and MPSIM_WORKERS.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Step budget per trajectory. Overrides mpsim.toml.
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Run until absorption with no step budget.
    #[arg(long, conflicts_with = "max_steps")]
    pub unbounded: bool,

    /// Master seed for per-trajectory seeds. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Cancel the run after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write every trajectory as a JSON line to this file.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Load a stored cache by identifier instead of generating the process.
    #[arg(long, value_name = "ID")]
    pub cache: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Serialize)]
struct FixationOutput {
    population: u32,
    start: [u32; 2],
    fitness: f64,
    seed: Option<u64>,
    trajectories: u64,
    a_fixed: u64,
    b_fixed: u64,
    unresolved: u64,
    fixation_probability: f64,
    expected_probability: f64,
    mean_length: Option<f64>,
    elapsed_ms: u128,
}

/// Fixation probability of type A from `start` A individuals, with B at
/// relative fitness `r`.
fn expected_fixation(population: u32, start: u32, r: f64) -> f64 {
    if (r - 1.0).abs() < f64::EPSILON {
        return f64::from(start) / f64::from(population);
    }
    let start = i32::try_from(start).unwrap_or(i32::MAX);
    let population = i32::try_from(population).unwrap_or(i32::MAX);
    (1.0 - r.powi(start)) / (1.0 - r.powi(population))
}

fn load_or_build(args: &FixationArgs, config: &RunConfig) -> Result<SimulationCache<[u32; 2]>> {
    if let Some(id) = &args.cache {
        return args
            .store
            .open(config)
            .load(id)
            .with_context(|| format!("Failed to load cache {id}"));
    }
    let edges = moran_transitions(args.population, &StaticFitness::new(args.fitness));
    Ok(compile_edges(edges))
}

/// Execute `mpsim fixation`.
pub fn run_fixation(args: &FixationArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    if args.start == 0 || args.start >= args.population {
        bail!(
            "--start must be between 1 and {} for a population of {}",
            args.population.saturating_sub(1),
            args.population
        );
    }

    let config = resolve_config(project_root)?;
    let cache = Arc::new(load_or_build(args, &config)?);
    let max_steps = if args.unbounded {
        None
    } else {
        args.max_steps.or(config.batch.max_steps)
    };
    let chunk_size = args.chunk_size.unwrap_or(config.batch.chunk_size);
    let start = [args.start, args.population - args.start];
    let report = if args.output.is_some() {
        config.batch.report
    } else {
        ReportMode::Short
    };
    let seeds = args.seed.map_or_else(SeedStream::from_entropy, SeedStream::random);

    let batch = BatchOrchestrator::new().with_workers(args.workers.or(config.batch.workers));
    if let Some(secs) = args.timeout_secs {
        // Dropping the handle detaches the watchdog thread.
        let _watchdog = batch.cancel_token().cancel_after(Duration::from_secs(secs));
    }

    info!(
        population = args.population,
        start = %format_state(&start),
        trajectories = args.trajectories,
        chunk_size,
        "running fixation batch"
    );

    let mut counter = ConvergentsCounter::new();
    let mut lengths = RunLengthRecorder::new();
    let mut writer = args
        .output
        .as_ref()
        .map(|path| {
            File::create(path)
                .map(|f| ResultsWriter::new(BufWriter::new(f)))
                .with_context(|| format!("Failed to create {}", path.display()))
        })
        .transpose()?;

    let started = Instant::now();
    {
        let mut fanout = Fanout::<[u32; 2]>::new().with(&mut counter).with(&mut lengths);
        if let Some(w) = writer.as_mut() {
            fanout.push(w);
        }
        let params = parameter_stream(cache, constant(start), seeds, max_steps, report);
        batch
            .stream(params, ChunkSizes::new(args.trajectories, chunk_size), &mut fanout)
            .context("fixation run failed")?;
    }
    let elapsed_ms = started.elapsed().as_millis();

    if let Some(w) = writer {
        w.into_inner()
            .flush()
            .context("Failed to flush trajectory output")?;
    }

    let n = args.population;
    let a_fixed = counter.count(&[n, 0]);
    let b_fixed = counter.count(&[0, n]);
    let total = counter.total();
    let out = FixationOutput {
        population: n,
        start,
        fitness: args.fitness,
        seed: args.seed,
        trajectories: total,
        a_fixed,
        b_fixed,
        unresolved: total - a_fixed - b_fixed,
        fixation_probability: if total == 0 {
            0.0
        } else {
            a_fixed as f64 / total as f64
        },
        expected_probability: expected_fixation(n, args.start, args.fitness),
        mean_length: lengths.mean(),
        elapsed_ms,
    };

    render_mode(
        output,
        &out,
        |out, w| {
            writeln!(
                w,
                "fixation population={} start={} fitness={} trajectories={}",
                out.population,
                format_state(&out.start),
                out.fitness,
                out.trajectories
            )?;
            writeln!(
                w,
                "results a_fixed={} b_fixed={} unresolved={} p_a={:.6} expected={:.6}",
                out.a_fixed,
                out.b_fixed,
                out.unresolved,
                out.fixation_probability,
                out.expected_probability
            )?;
            if let Some(mean) = out.mean_length {
                writeln!(w, "lengths mean={mean:.3}")?;
            }
            Ok(())
        },
        |out, w| {
            pretty_section(w, "Fixation")?;
            pretty_kv(w, "Population", out.population.to_string())?;
            pretty_kv(w, "Start", format_state(&out.start))?;
            pretty_kv(w, "Fitness (B)", out.fitness.to_string())?;
            pretty_kv(w, "Trajectories", out.trajectories.to_string())?;
            pretty_kv(
                w,
                "A fixed",
                format!("{} ({:.4})", out.a_fixed, out.fixation_probability),
            )?;
            pretty_kv(w, "B fixed", out.b_fixed.to_string())?;
            if out.unresolved > 0 {
                pretty_kv(w, "Unresolved", format!("{} hit the step budget", out.unresolved))?;
            }
            pretty_kv(w, "Expected", format!("{:.4}", out.expected_probability))?;
            if let Some(mean) = out.mean_length {
                pretty_kv(w, "Mean length", format!("{mean:.2} steps"))?;
            }
            pretty_kv(w, "Elapsed", format!("{} ms", out.elapsed_ms))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_expectation_is_initial_frequency() {
        assert!((expected_fixation(10, 3, 1.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn advantageous_a_fixes_more_often_than_neutral() {
        // B at fitness 0.5 means A is twice as fit.
        let p = expected_fixation(10, 1, 0.5);
        assert!(p > 0.1);
        assert!((p - 0.5 / (1.0 - 0.5_f64.powi(10))).abs() < 1e-12);
    }
}
