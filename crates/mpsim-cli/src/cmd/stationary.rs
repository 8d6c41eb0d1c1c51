//! `mpsim stationary`: power iteration toward the long-run distribution.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use mpsim_core::{Edge, StationaryCache, WeightedGraph};
use mpsim_sim::moran::{StaticFitness, moran_transitions};
use mpsim_sim::{ConvergenceConfig, converge};

use super::format_state;
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct StationaryArgs {
    /// Population size of the generated two-type process.
    #[arg(short = 'n', long, default_value = "10")]
    pub population: u32,

    /// Fitness of type B relative to type A.
    #[arg(short = 'r', long, default_value = "1.0")]
    pub fitness: f64,

    /// JSON array of `{source, target, weight}` edges with integer-vector
    /// states. Replaces the generated process.
    #[arg(long, value_name = "PATH")]
    pub edges: Option<PathBuf>,

    /// Stop once successive vectors are this close in L1 distance.
    #[arg(long, default_value = "1e-12")]
    pub tolerance: f64,

    /// Give up after this many iterations.
    #[arg(long, default_value = "10000")]
    pub max_iter: usize,

    /// Let mass drain out of absorbing states instead of holding it there.
    #[arg(long)]
    pub drain: bool,
}

#[derive(Debug, Serialize)]
struct StateMass {
    state: Vec<u32>,
    mass: f64,
}

#[derive(Debug, Serialize)]
struct StationaryOutput {
    vertices: usize,
    iterations: usize,
    converged: bool,
    delta: f64,
    total_mass: f64,
    distribution: Vec<StateMass>,
}

fn read_edges(path: &Path) -> Result<Vec<Edge<Vec<u32>>>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn build_graph(args: &StationaryArgs) -> Result<WeightedGraph<Vec<u32>>> {
    let mut graph: WeightedGraph<Vec<u32>> = match &args.edges {
        Some(path) => WeightedGraph::from_edges(read_edges(path)?),
        None => {
            let edges = moran_transitions(args.population, &StaticFitness::new(args.fitness));
            WeightedGraph::from_edges(
                edges
                    .into_iter()
                    .map(|e| Edge::new(e.source.to_vec(), e.target.to_vec(), e.weight)),
            )
        }
    };

    if !args.drain {
        let sinks: Vec<Vec<u32>> = graph
            .vertices()
            .iter()
            .filter(|v| graph.is_sink(v))
            .cloned()
            .collect();
        for sink in sinks {
            graph.add_edge(sink.clone(), sink, 1.0);
        }
    }
    graph.normalize_weights();
    Ok(graph)
}

/// Execute `mpsim stationary`.
pub fn run_stationary(
    args: &StationaryArgs,
    output: OutputMode,
    _project_root: &Path,
) -> Result<()> {
    let graph = build_graph(args)?;
    let cache = StationaryCache::build(&graph);
    info!(
        vertices = cache.len(),
        terminals = cache.terminals().len(),
        "running power iteration"
    );

    let config = ConvergenceConfig {
        tolerance: args.tolerance,
        max_iter: args.max_iter,
    };
    let result = converge(&cache, None, &config).context("power iteration failed")?;
    if !result.converged {
        warn!(
            iterations = result.iterations,
            delta = result.delta,
            "power iteration did not converge"
        );
    }

    let out = StationaryOutput {
        vertices: cache.len(),
        iterations: result.iterations,
        converged: result.converged,
        delta: result.delta,
        total_mass: result.distribution.iter().sum(),
        distribution: cache
            .labelled(&result.distribution)
            .into_iter()
            .map(|(state, mass)| StateMass {
                state: state.clone(),
                mass,
            })
            .collect(),
    };

    render_mode(
        output,
        &out,
        |out, w| {
            writeln!(
                w,
                "stationary vertices={} iterations={} converged={} delta={:e}",
                out.vertices, out.iterations, out.converged, out.delta
            )?;
            for entry in &out.distribution {
                writeln!(w, "state={} mass={:.12}", format_state(&entry.state), entry.mass)?;
            }
            Ok(())
        },
        |out, w| {
            pretty_section(w, "Stationary distribution")?;
            pretty_kv(w, "Vertices", out.vertices.to_string())?;
            let status = if out.converged { "converged" } else { "max_iter reached" };
            pretty_kv(w, "Iterations", format!("{} ({status})", out.iterations))?;
            pretty_kv(w, "Delta", format!("{:e}", out.delta))?;
            pretty_kv(w, "Total mass", format!("{:.6}", out.total_mass))?;
            pretty_rule(w)?;
            for entry in &out.distribution {
                pretty_kv(w, &format_state(&entry.state), format!("{:.6}", entry.mass))?;
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(population: u32, drain: bool) -> StationaryArgs {
        StationaryArgs {
            population,
            fitness: 1.0,
            edges: None,
            tolerance: 1e-12,
            max_iter: 10_000,
            drain,
        }
    }

    #[test]
    fn sinks_get_self_loops_unless_draining() {
        let held = build_graph(&args(4, false)).expect("graph");
        assert!(!held.is_sink(&vec![0, 4]));
        assert!(!held.is_sink(&vec![4, 0]));
        assert_eq!(held.out_dict(&vec![4, 0]), vec![(&vec![4_u32, 0], 1.0)]);

        let drained = build_graph(&args(4, true)).expect("graph");
        assert!(drained.is_sink(&vec![0, 4]));
        assert!(drained.is_sink(&vec![4, 0]));
    }

    #[test]
    fn edge_file_replaces_generated_process() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.json");
        fs::write(
            &path,
            r#"[{"source":[0],"target":[1],"weight":2.0},
                {"source":[0],"target":[0],"weight":2.0},
                {"source":[1],"target":[0],"weight":1.0}]"#,
        )
        .expect("write");

        let mut a = args(10, false);
        a.edges = Some(path);
        let graph = build_graph(&a).expect("graph");
        assert_eq!(graph.vertices(), &[vec![0_u32], vec![1]]);
        assert_eq!(
            graph.out_dict(&vec![0]),
            vec![(&vec![1_u32], 0.5), (&vec![0_u32], 0.5)]
        );
    }

    #[test]
    fn malformed_edge_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").expect("write");
        let mut a = args(10, false);
        a.edges = Some(path);
        let err = build_graph(&a).expect_err("parse failure");
        assert!(format!("{err:#}").contains("Failed to parse"));
    }
}
