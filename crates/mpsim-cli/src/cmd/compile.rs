//! `mpsim compile`: build a Moran process cache and persist it.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use mpsim_core::config::resolve_config;
use mpsim_core::{CacheKey, CacheStore, SimulationCache, compile_edges};
use mpsim_sim::moran::{
    Fermi, LinearFitness, StaticFitness, moran_transitions, multivariate_moran_transitions,
    rock_scissors_paper,
};

use super::StoreArgs;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// How the stored cache is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyKind {
    /// blake3 hash of the stored bytes, verified on load.
    Content,
    /// UTC creation time.
    Timestamp,
    /// The value of `--name`.
    Name,
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Population size.
    #[arg(short = 'n', long, default_value = "10")]
    pub population: u32,

    /// Number of types: 2 (static fitness) or 3 (rock-scissors-paper).
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u8).range(2..=3))]
    pub types: u8,

    /// Relative fitness of type B. Two-type process only.
    #[arg(short = 'r', long, default_value = "1.0")]
    pub fitness: f64,

    /// Payoff for a win. Three-type process only.
    #[arg(long, default_value = "1.0")]
    pub rsp_win: f64,

    /// Loss penalty. Three-type process only.
    #[arg(long, default_value = "1.0")]
    pub rsp_loss: f64,

    /// Selection strength of the exponential fitness map. Three-type
    /// process only.
    #[arg(long, default_value = "1.0")]
    pub beta: f64,

    /// Identifier scheme for the stored file.
    #[arg(long, value_enum, default_value_t = KeyKind::Content)]
    pub key: KeyKind,

    /// Cache name, required with `--key name`.
    #[arg(long, required_if_eq("key", "name"))]
    pub name: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl CompileArgs {
    fn cache_key(&self) -> CacheKey {
        match self.key {
            KeyKind::Content => CacheKey::Content,
            KeyKind::Timestamp => CacheKey::Timestamp,
            KeyKind::Name => CacheKey::Named(self.name.clone().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompileOutput {
    identifier: String,
    path: String,
    types: u8,
    population: u32,
    vertices: usize,
    absorbing: usize,
}

fn absorbing_count<V>(cache: &SimulationCache<V>) -> usize {
    cache.absorbing().iter().filter(|&&a| a).count()
}

/// Execute `mpsim compile`.
pub fn run_compile(args: &CompileArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = resolve_config(project_root)?;
    let store: CacheStore = args.store.open(&config);
    let key = args.cache_key();

    let (identifier, vertices, absorbing) = if args.types == 2 {
        let edges = moran_transitions(args.population, &StaticFitness::new(args.fitness));
        let cache = compile_edges::<[u32; 2], _>(edges);
        let id = store.store(&cache, &key).context("Failed to store cache")?;
        (id, cache.len(), absorbing_count(&cache))
    } else {
        let game = LinearFitness::new(rock_scissors_paper(args.rsp_win, args.rsp_loss));
        let edges = multivariate_moran_transitions(args.population, &Fermi::new(game, args.beta));
        let cache = compile_edges::<[u32; 3], _>(edges);
        let id = store.store(&cache, &key).context("Failed to store cache")?;
        (id, cache.len(), absorbing_count(&cache))
    };

    let out = CompileOutput {
        path: store.path_for(&identifier).display().to_string(),
        identifier,
        types: args.types,
        population: args.population,
        vertices,
        absorbing,
    };

    render_mode(
        output,
        &out,
        |out, w| {
            writeln!(
                w,
                "compiled id={} types={} population={} vertices={} absorbing={}",
                out.identifier, out.types, out.population, out.vertices, out.absorbing
            )?;
            writeln!(w, "path={}", out.path)
        },
        |out, w| {
            pretty_section(w, "Compiled cache")?;
            pretty_kv(w, "Identifier", &out.identifier)?;
            pretty_kv(w, "Process", format!("{}-type, N = {}", out.types, out.population))?;
            pretty_kv(w, "Vertices", out.vertices.to_string())?;
            pretty_kv(w, "Absorbing", out.absorbing.to_string())?;
            pretty_kv(w, "Path", &out.path)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CompileArgs,
    }

    #[test]
    fn defaults_to_content_key() {
        let h = Harness::try_parse_from(["compile"]).expect("parse");
        assert_eq!(h.args.types, 2);
        assert_eq!(h.args.cache_key(), CacheKey::Content);
    }

    #[test]
    fn name_key_requires_a_name() {
        assert!(Harness::try_parse_from(["compile", "--key", "name"]).is_err());
        let h = Harness::try_parse_from(["compile", "--key", "name", "--name", "rsp30"])
            .expect("parse");
        assert_eq!(h.args.cache_key(), CacheKey::Named("rsp30".into()));
    }

    #[test]
    fn only_two_or_three_types() {
        assert!(Harness::try_parse_from(["compile", "--types", "4"]).is_err());
        assert!(Harness::try_parse_from(["compile", "--types", "1"]).is_err());
        let h = Harness::try_parse_from(["compile", "--types", "3"]).expect("parse");
        assert_eq!(h.args.types, 3);
    }

    #[test]
    fn absorbing_states_are_the_monomorphic_ones() {
        let cache = compile_edges::<[u32; 2], _>(moran_transitions(5, &StaticFitness::new(1.0)));
        assert_eq!(absorbing_count(&cache), 2);
    }
}
