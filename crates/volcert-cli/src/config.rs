//! Configuration file support for the volcert CLI.
//!
//! The file is looked up in this order:
//!
//! 1. `--config <PATH>` (must exist)
//! 2. `$VOLCERT_CONFIG_DIR/config.toml`
//! 3. `~/.config/volcert/config.toml` (XDG) or the platform equivalent
//!
//! A missing file in locations 2 and 3 means "use the defaults".
//!
//! # Example configuration
//!
//! ```toml
//! seed = 42
//!
//! [probe]
//! prefix = "certtest-"
//! suffix_length = 10
//! content = "hello persi"
//!
//! [host_check]
//! mode = "shell"
//! shell = "bash"
//! command = "cat /proc/mounts | grep -E '{mountpoint}'"
//! timeout = "10s"
//!
//! [driver]
//! request_timeout = "60s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use volcert_core::DEFAULT_REQUEST_TIMEOUT;
use volcert_mount::{HostCheckConfig, ProbeConfig};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "VOLCERT_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Fixed seed for probe file names (random per run when unset)
    pub seed: Option<u64>,

    /// Probe file settings
    pub probe: ProbeConfig,

    /// Host mount verification
    pub host_check: HostCheckConfig,

    /// Driver client settings
    pub driver: DriverSettings,
}

/// Driver client settings
#[derive(Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverSettings {
    /// Deadline for a single driver request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HarnessConfig {
    /// Load the configuration, falling back to defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = config_path()?;
                if !path.exists() {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// Get the path to the default configuration file.
pub fn config_path() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join(CONFIG_FILE));
    }

    let dirs = directories::ProjectDirs::from("com", "volcert", "volcert")
        .context("Failed to determine config directory")?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}
