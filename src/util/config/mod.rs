//! Bridge configuration
//!
//! # Configuration lookup
//!
//! ```text
//! Priority (high → low):
//! 1. Explicit path (CLI --config)
//! 2. DISPATCH_CONFIG environment variable
//! 3. User-level (~/.config/distributed-dispatch/config.toml)
//! 4. Default values
//! ```
//!
//! A missing file at the chosen location means defaults.
//!
//! # Usage
//!
//! ```rust
//! use distributed_dispatch::util::config::BridgeConfig;
//!
//! let config = BridgeConfig::from_toml_str("[arena]\ntrace_events = true").unwrap();
//! assert!(config.arena.trace_events);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::util::logger::LogLevel;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "DISPATCH_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Frame arena settings
    #[serde(default)]
    pub arena: ArenaConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Frame arena configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Slots reserved up front
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Upper bound on simultaneously live frames
    #[serde(default)]
    pub max_live_frames: Option<usize>,
    /// Record every allocate/release in order
    #[serde(default)]
    pub trace_events: bool,
}

fn default_initial_capacity() -> usize {
    16
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            max_live_frames: None,
            trace_events: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: LogLevel,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render configuration as TOML text
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join(crate::NAME));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join(crate::NAME));
    }

    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join(crate::NAME));
    }

    None
}

/// Get the user config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Pick the config file to read, following the lookup order
pub fn config_location(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    get_config_path()
}

/// Load configuration from `path`; a missing file yields defaults
pub fn load_from_path(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(BridgeConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = BridgeConfig::from_toml_str(&content)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load configuration following the lookup order
pub fn load_config(explicit: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    match config_location(explicit) {
        Some(path) => load_from_path(&path),
        None => Ok(BridgeConfig::default()),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
