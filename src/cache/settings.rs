//! File-based cache configuration
//!
//! Code declares which leaf types are cacheable; settings may resize the cache
//! and retune expiry for those types without a rebuild.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Deployment-level cache tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Global entry cap (no cap when absent)
    pub maximum_entries: Option<usize>,

    /// Expiry overrides in seconds, keyed by leaf type name (e.g. `FetchPullRequest`)
    pub expire_after_write_secs: BTreeMap<String, u64>,
}

impl CacheSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read cache settings: {:?}", path))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse cache settings: {:?}", path))
    }

    /// Write settings to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        fs::write(path, data).with_context(|| format!("Failed to write cache settings: {:?}", path))
    }
}
