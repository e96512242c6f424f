//! Desired-state manifest.
//!
//! A TOML file with one array of tables per resource kind:
//!
//! ```toml
//! [[rate_limit_practice]]
//! name = "login"
//! rules = [{ uri = "/login", scope = "Minute", limit = 10, action = "Prevent" }]
//! ```

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// One declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    pub kind: String,
    pub name: String,
    pub body: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub entries: Vec<Declared>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let tables: BTreeMap<String, Vec<toml::Table>> =
            toml::from_str(content).context("Every top-level key must be an array of tables")?;

        let mut entries = Vec::new();
        for (kind, items) in tables {
            let mut seen = HashSet::new();
            for (index, table) in items.into_iter().enumerate() {
                let name = match table.get("name").and_then(toml::Value::as_str) {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => bail!("{kind}[{index}] has no name"),
                };
                if !seen.insert(name.clone()) {
                    bail!("{kind} {name:?} is declared more than once");
                }
                let body = serde_json::to_value(&table)
                    .with_context(|| format!("{kind} {name:?} cannot be represented as JSON"))?;
                entries.push(Declared { kind: kind.clone(), name, body });
            }
        }
        Ok(Self { entries })
    }

    /// Fail on kinds that `known` doesn't list
    pub fn check_kinds(&self, known: &[&str]) -> Result<()> {
        if let Some(entry) = self.entries.iter().find(|e| !known.contains(&e.kind.as_str())) {
            bail!(
                "Unknown resource kind {:?} (known kinds: {})",
                entry.kind,
                known.join(", ")
            );
        }
        Ok(())
    }

    /// Entries matching the optional kind and name filters
    pub fn select<'a>(
        &'a self,
        kind: Option<&'a str>,
        name: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Declared> + 'a {
        self.entries
            .iter()
            .filter(move |e| kind.is_none_or(|k| e.kind == k))
            .filter(move |e| name.is_none_or(|n| e.name == n))
    }
}
