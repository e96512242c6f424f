//! Path resolution for policyctl
//!
//! # Environment Variables
//!
//! - `POLICYCTL_CONFIG_DIR` - Override config directory
//! - `POLICYCTL_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `POLICYCTL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/policyctl` (if set)
//! 3. `~/.config/policyctl`
//!
//! For state_dir():
//! 1. `POLICYCTL_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/policyctl` (if set)
//! 3. `~/.local/state/policyctl`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "POLICYCTL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "POLICYCTL_STATE_DIR";

const APP_DIR: &str = "policyctl";

/// Get the policyctl config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = resolve(
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        &home.join(".config"),
    );
    log::debug!("Using config dir: {}", path.display());
    Ok(path)
}

/// Get the policyctl state directory path
pub fn state_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = resolve(
        std::env::var(ENV_STATE_DIR).ok().as_deref(),
        std::env::var("XDG_STATE_HOME").ok().as_deref(),
        &home.join(".local").join("state"),
    );
    log::debug!("Using state dir: {}", path.display());
    Ok(path)
}

/// Default config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default state cache path
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("state.toml"))
}

/// Default manifest path
pub fn manifest_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("manifest.toml"))
}

fn resolve(override_dir: Option<&str>, xdg_dir: Option<&str>, fallback_base: &Path) -> PathBuf {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return expand(dir);
    }
    if let Some(xdg) = xdg_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(xdg).join(APP_DIR);
    }
    fallback_base.join(APP_DIR)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
