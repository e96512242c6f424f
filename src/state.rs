//! Observed-state cache.
//!
//! One entry per resource kind and name, holding the backend ID and the
//! last rendered observation as JSON text. An entry is only replaced after
//! a confirmed mutation or read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// Cached observation of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// Backend ID
    pub id: String,
    /// Rendered observed state, as JSON
    pub observed: String,
    /// When the observation was last confirmed
    pub refreshed_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(id: &str, observed: &Value) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            observed: serde_json::to_string(observed).context("Failed to encode observed state")?,
            refreshed_at: Utc::now(),
        })
    }

    pub fn observed(&self) -> Result<Value> {
        serde_json::from_str(&self.observed)
            .with_context(|| format!("Cached observation for {} is not valid JSON", self.id))
    }
}

/// Cache of observed state, keyed by kind then name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCache {
    #[serde(default)]
    pub resources: BTreeMap<String, BTreeMap<String, CachedEntry>>,
}

impl StateCache {
    /// Load the cache from `path`, or an empty one if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, kind: &str, name: &str) -> Option<&CachedEntry> {
        self.resources.get(kind).and_then(|entries| entries.get(name))
    }

    /// Replace the entry for `kind`/`name`
    pub fn record(&mut self, kind: &str, name: &str, entry: CachedEntry) {
        self.resources
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), entry);
    }

    pub fn forget(&mut self, kind: &str, name: &str) -> Option<CachedEntry> {
        let entries = self.resources.get_mut(kind)?;
        let removed = entries.remove(name);
        if entries.is_empty() {
            self.resources.remove(kind);
        }
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================
