use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;

/// Name of the per-project config file, read from the working directory.
pub const CONFIG_FILE: &str = "mpsim.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Whether a trajectory keeps its full path or only its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Full,
    Short,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Worker threads per chunk. `None` means hardware concurrency.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Step budget per trajectory. `None` means run until absorption.
    #[serde(default = "default_max_steps")]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub report: ReportMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            workers: None,
            max_steps: default_max_steps(),
            report: ReportMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for stored caches. `None` resolves to [`default_cache_dir`].
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    #[must_use]
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_cache_dir)
    }
}

const fn default_chunk_size() -> usize {
    10_000
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_steps() -> Option<u64> {
    Some(10_000)
}

/// `<user cache dir>/mpsim`, or `.mpsim/cache` when the platform has none.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(|| PathBuf::from(".mpsim/cache"), |dir| dir.join("mpsim"))
}

/// Load `mpsim.toml` from `project_root`, or defaults if it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<RunConfig> {
    let path = project_root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(RunConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<RunConfig>(&content).with_context(|| {
        format!(
            "[{}] Failed to parse {}",
            ErrorCode::ConfigParseError.code(),
            path.display()
        )
    })
}

/// Load the project config and apply environment overrides.
///
/// `MPSIM_WORKERS` replaces `batch.workers` when it parses as a positive
/// integer; other values are ignored with a warning.
///
/// # Errors
///
/// Propagates [`load_config`] errors.
pub fn resolve_config(project_root: &Path) -> Result<RunConfig> {
    let mut config = load_config(project_root)?;
    apply_workers_override(&mut config, env::var("MPSIM_WORKERS").ok().as_deref());
    Ok(config)
}

fn apply_workers_override(config: &mut RunConfig, raw: Option<&str>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => config.batch.workers = Some(n),
        _ => tracing::warn!(value = raw, "ignoring invalid MPSIM_WORKERS"),
    }
}
