use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable read for the bearer token unless `token_env` says otherwise
pub const DEFAULT_TOKEN_ENV: &str = "POLICYCTL_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Full GraphQL URL
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load config from `path`, or defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            bail!("No endpoint configured; set `endpoint` in config.toml");
        }
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            bail!("Endpoint must be an http(s) URL: {}", self.endpoint);
        }
        if self.token_env.is_empty() {
            bail!("`token_env` must name an environment variable");
        }
        if self.timeout_secs == 0 {
            bail!("`timeout_secs` must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env)
            .with_context(|| format!("Environment variable {} is not set", self.token_env))
    }
}

// ============================================================================
// Tests
// ============================================================================
