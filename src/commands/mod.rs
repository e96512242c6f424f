//! Command implementations and the session they share.

pub mod apply;
pub mod plan;
pub mod resource;

use crate::Context;
use crate::config::Config;
use crate::manifest::Manifest;
use crate::paths;
use crate::registry::Registry;
use crate::state::StateCache;
use anyhow::Result;
use dialoguer::Confirm;
use policy::HttpTransport;
use std::path::{Path, PathBuf};

/// Registry plus the observed-state cache for one command run
pub struct Session {
    pub registry: Registry,
    pub state: StateCache,
    state_path: PathBuf,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let state_path = match &ctx.state {
            Some(path) => path.clone(),
            None => paths::state_file()?,
        };
        Ok(Self {
            registry: Registry::standard(),
            state: StateCache::load(&state_path)?,
            state_path,
        })
    }

    pub fn save_state(&self) -> Result<()> {
        self.state.save(&self.state_path)
    }

    pub fn manifest(&self, path: Option<&Path>) -> Result<Manifest> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => paths::manifest_file()?,
        };
        let manifest = Manifest::load(&path)?;
        manifest.check_kinds(&self.registry.kinds())?;
        Ok(manifest)
    }
}

/// Load and validate the config, then open a transport to its endpoint
pub fn connect(ctx: &Context) -> Result<HttpTransport> {
    let path = match &ctx.config {
        Some(path) => path.clone(),
        None => paths::config_file()?,
    };
    let config = Config::load(&path)?;
    config.validate()?;
    log::info!("Using endpoint {}", config.endpoint);
    Ok(HttpTransport::new(&config.endpoint, config.token()?, config.timeout()))
}

/// Ask before a mutation unless `yes` was given
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(confirmed)
}
