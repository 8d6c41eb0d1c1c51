pub mod compile;
pub mod fixation;
pub mod stationary;

use std::path::PathBuf;

use clap::Args;
use mpsim_core::{CacheStore, RunConfig};

/// Where stored caches live.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Cache directory. Overrides `[cache] dir` in mpsim.toml.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl StoreArgs {
    pub fn open(&self, config: &RunConfig) -> CacheStore {
        let dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(|| config.cache.resolved_dir());
        CacheStore::new(dir)
    }
}

/// Render a population vector as `a,b,...`.
pub fn format_state(state: &[u32]) -> String {
    state
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
