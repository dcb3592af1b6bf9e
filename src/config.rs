//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.pixcache/config.toml` (user)
//! 3. `/etc/pixcache/config.toml` (system)
//!
//! Every section is optional. Without any file the defaults apply, which
//! means no-store mode unless `PIXCACHE_DATABASE_URL` is set. The generator
//! API key is read from `PIXCACHE_GENERATOR_API_KEY`, never from the file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::generator::QueueConfig;
use crate::store::StoreConfig;
use crate::{PixcacheError, Result};

/// Environment variable holding the generator API key.
pub const GENERATOR_API_KEY_ENV: &str = "PIXCACHE_GENERATOR_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generation: QueueConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Remote generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Endpoint accepting `POST {"prompt": ...}` and returning an image.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP request timeout in seconds (default: 1800).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30 * 60
}

impl GeneratorConfig {
    /// API key from the environment, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(GENERATOR_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.pixcache/config.toml`
    /// 3. `/etc/pixcache/config.toml`
    ///
    /// Falls back to defaults when no file is found. The store URL is then
    /// overridden by `PIXCACHE_DATABASE_URL` when set.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                debug!("no config file found, using defaults");
                Config::default()
            }
        };
        Ok(config.with_env_overrides())
    }

    /// Parse a configuration file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PixcacheError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            PixcacheError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn with_env_overrides(mut self) -> Self {
        self.store = self.store.with_env_override();
        self
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(PixcacheError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".pixcache").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/pixcache/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}
