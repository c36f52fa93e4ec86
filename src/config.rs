//! Host configuration loaded from `<config_dir>/config.toml`.

use anyhow::{Context, Result};
use declarative::Permissions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

const CONFIG_FILE: &str = "config.toml";
const STATE_FILE: &str = "state.toml";

/// Settings for the filesystem-backed system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Override for the persistent state file
    pub state_file: Option<String>,

    /// Working directory for scripts (default: home)
    pub script_dir: Option<String>,

    /// Program used to run scripts, e.g. `/bin/sh`.
    /// When unset the script file is executed directly.
    pub interpreter: Option<String>,

    /// Bits cleared from target modes by [`Config::mask`]
    pub umask: Permissions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: None,
            script_dir: None,
            interpreter: None,
            umask: 0o022,
        }
    }
}

impl Config {
    /// Load `config.toml` from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = paths::config_dir()?.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolved path of the persistent state file
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(file) => Ok(paths::expand(file)),
            None => Ok(paths::state_dir()?.join(STATE_FILE)),
        }
    }

    /// Resolved working directory for scripts
    pub fn script_working_dir(&self) -> Result<PathBuf> {
        match &self.script_dir {
            Some(dir) => Ok(paths::expand(dir)),
            None => dirs::home_dir().context("Could not determine home directory"),
        }
    }

    /// Apply the umask to a mode before building a target from it
    pub const fn mask(&self, perm: Permissions) -> Permissions {
        perm & !self.umask
    }
}
