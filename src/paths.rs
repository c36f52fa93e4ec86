//! Config and state directory resolution
//!
//! Each directory is looked up in order:
//!
//! 1. an explicit override variable (`DOTCONVERGE_CONFIG_DIR`,
//!    `DOTCONVERGE_STATE_DIR`), with `~` and `$VAR` expanded
//! 2. the XDG base variable (`XDG_CONFIG_HOME`, `XDG_STATE_HOME`) joined
//!    with `dotconverge`
//! 3. the platform default: `%APPDATA%` / `%LOCALAPPDATA%` on Windows,
//!    `~/.config/dotconverge` and `~/.local/state/dotconverge` elsewhere

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "dotconverge";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "DOTCONVERGE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "DOTCONVERGE_STATE_DIR";

/// Where one kind of directory may come from
struct Lookup {
    what: &'static str,
    override_var: &'static str,
    xdg_var: &'static str,
    /// Path under the home directory, used when nothing else applies
    home_default: &'static [&'static str],
    #[cfg_attr(not(windows), allow(dead_code))]
    windows_base: fn() -> Option<PathBuf>,
}

const CONFIG: Lookup = Lookup {
    what: "config",
    override_var: ENV_CONFIG_DIR,
    xdg_var: "XDG_CONFIG_HOME",
    home_default: &[".config"],
    windows_base: dirs::config_dir,
};

const STATE: Lookup = Lookup {
    what: "state",
    override_var: ENV_STATE_DIR,
    xdg_var: "XDG_STATE_HOME",
    home_default: &[".local", "state"],
    windows_base: dirs::data_local_dir,
};

impl Lookup {
    fn resolve(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(self.override_var) {
            let path = expand(&dir);
            log::debug!(
                "Using {} dir from {}: {}",
                self.what,
                self.override_var,
                path.display()
            );
            return Ok(path);
        }

        if let Ok(base) = std::env::var(self.xdg_var) {
            let path = PathBuf::from(base).join(APP_NAME);
            log::debug!("Using {}: {}", self.xdg_var, path.display());
            return Ok(path);
        }

        #[cfg(windows)]
        {
            if let Some(base) = (self.windows_base)() {
                return Ok(base.join(APP_NAME));
            }
        }

        let mut path = dirs::home_dir().context("Could not determine home directory")?;
        path.extend(self.home_default);
        path.push(APP_NAME);
        log::debug!("Using default {} dir: {}", self.what, path.display());
        Ok(path)
    }
}

/// Directory holding `config.toml`
pub fn config_dir() -> Result<PathBuf> {
    CONFIG.resolve()
}

/// Directory holding the persistent state file
pub fn state_dir() -> Result<PathBuf> {
    STATE.resolve()
}

/// Expand `~` and environment variables in a path.
///
/// Unknown variables are left as written.
///
/// ```
/// let path = dotconverge::paths::expand("/srv/$DOTCONVERGE_NOT_SET/x");
/// assert_eq!(path, std::path::PathBuf::from("/srv/$DOTCONVERGE_NOT_SET/x"));
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
