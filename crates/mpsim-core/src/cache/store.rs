//! Persist compiled [`SimulationCache`]s between runs.
//!
//! Caches are stored as JSON under a directory, one file per identifier.
//! Content-addressed identifiers are the blake3 hash of the stored bytes and
//! are re-verified on load; timestamped and named identifiers are not.

use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::SimulationCache;
use crate::error::ErrorCode;

const EXTENSION: &str = "json";
const CONTENT_PREFIX: &str = "b3-";

/// How [`CacheStore::store`] names the stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// blake3 hash of the serialized cache.
    Content,
    /// UTC creation time, e.g. `20260416T093012.123456Z`.
    Timestamp,
    /// Caller-chosen name.
    Named(String),
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `identifier`.
    #[must_use]
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.{EXTENSION}"))
    }

    /// Write `cache` and return the identifier to load it by.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be serialized or the file
    /// cannot be written.
    pub fn store<V>(&self, cache: &SimulationCache<V>, key: &CacheKey) -> Result<String>
    where
        V: Serialize + Clone,
    {
        let bytes = serde_json::to_vec(cache).context("serialize simulation cache")?;

        let identifier = match key {
            CacheKey::Content => format!("{CONTENT_PREFIX}{}", blake3::hash(&bytes).to_hex()),
            CacheKey::Timestamp => chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string(),
            CacheKey::Named(name) => {
                if name.is_empty() || name.contains(['/', '\\']) {
                    bail!("invalid cache name {name:?}");
                }
                name.clone()
            }
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(&identifier);
        fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(
            identifier = %identifier,
            vertices = cache.len(),
            bytes = bytes.len(),
            "stored simulation cache"
        );
        Ok(identifier)
    }

    /// Load the cache stored under `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unparsable, or if a
    /// content-addressed file no longer matches its hash.
    pub fn load<V>(&self, identifier: &str) -> Result<SimulationCache<V>>
    where
        V: DeserializeOwned + Clone + Eq + Hash,
    {
        let path = self.path_for(identifier);
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

        if let Some(expected) = identifier.strip_prefix(CONTENT_PREFIX) {
            let actual = blake3::hash(&bytes).to_hex();
            if actual.as_str() != expected {
                bail!(
                    "[{}] {}: {} hashes to {actual}",
                    ErrorCode::CacheCorrupted.code(),
                    ErrorCode::CacheCorrupted.message(),
                    path.display()
                );
            }
        }

        let cache: SimulationCache<V> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(identifier, vertices = cache.len(), "loaded simulation cache");
        Ok(cache)
    }

    /// Identifiers currently present in the store, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WeightedGraph;

    fn cache() -> SimulationCache<[u32; 2]> {
        let graph = WeightedGraph::from_edges([
            ([1, 2], [2, 1], 0.1),
            ([1, 2], [0, 3], 0.2),
            ([1, 2], [1, 2], 0.7),
            ([2, 1], [3, 0], 0.4),
            ([2, 1], [1, 2], 0.6),
        ]);
        SimulationCache::compile(&graph)
    }

    #[test]
    fn content_key_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        let original = cache();

        let id = store.store(&original, &CacheKey::Content).expect("store");
        assert!(id.starts_with(CONTENT_PREFIX));

        let loaded: SimulationCache<[u32; 2]> = store.load(&id).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn content_key_is_stable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        let a = store.store(&cache(), &CacheKey::Content).expect("store a");
        let b = store.store(&cache(), &CacheKey::Content).expect("store b");
        assert_eq!(a, b);
        assert_eq!(store.list().expect("list"), vec![a]);
    }

    #[test]
    fn tampered_content_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        let id = store.store(&cache(), &CacheKey::Content).expect("store");

        let path = store.path_for(&id);
        let mut text = fs::read_to_string(&path).expect("read");
        text.push(' ');
        fs::write(&path, text).expect("write");

        let err = store.load::<[u32; 2]>(&id).expect_err("hash mismatch");
        assert!(err.to_string().contains("E3001"));
    }

    #[test]
    fn named_and_timestamp_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("nested"));

        let named = store
            .store(&cache(), &CacheKey::Named("moran-n3".into()))
            .expect("store named");
        assert_eq!(named, "moran-n3");
        let stamped = store.store(&cache(), &CacheKey::Timestamp).expect("store stamped");
        assert!(stamped.ends_with('Z'));

        let loaded: SimulationCache<[u32; 2]> = store.load(&stamped).expect("load");
        assert_eq!(loaded, cache());
        assert_eq!(store.list().expect("list").len(), 2);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        assert!(store.store(&cache(), &CacheKey::Named("../escape".into())).is_err());
        assert!(store.store(&cache(), &CacheKey::Named(String::new())).is_err());
    }

    #[test]
    fn missing_identifier_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path());
        assert!(store.load::<[u32; 2]>("nope").is_err());
        assert!(store.list().expect("list").is_empty());
    }
}
