//! Configuration loading
//!
//! Resolution order:
//! 1. `--config <path>` on the command line
//! 2. `CANOPY_CONFIG` environment variable
//! 3. `<config dir>/canopy/config.toml`
//! 4. Compiled defaults
//!
//! `CANOPY_API_BASE` overrides `api_base` from any source.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;

const DEFAULT_API_BASE: &str = "https://greentrace-t95w.onrender.com/api";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the remote tree store
    pub api_base: String,
    /// Local store file; defaults to the user data directory
    pub database_path: Option<PathBuf>,
    /// Model description; the heuristic is used when absent or unloadable
    pub model_path: Option<PathBuf>,
    /// JSON list of named locations `[{name, lat, lng}]`
    pub locations_path: Option<PathBuf>,
    /// Kilograms of CO2 offset per verified tree per year
    pub co2_per_tree_kg: f64,
    /// How often to check for changes made by other tabs
    pub storage_poll_ms: u64,
    /// Sync event buffer size
    pub event_capacity: usize,
    /// Fallback tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            database_path: None,
            model_path: None,
            locations_path: None,
            co2_per_tree_kg: 21.0,
            storage_poll_ms: 500,
            event_capacity: 100,
            log_filter: "canopy=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve and load configuration
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::locate(cli_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Ok(api_base) = std::env::var("CANOPY_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn locate(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_path {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("CANOPY_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join("canopy").join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Where the local store lives
    ///
    /// - Linux: ~/.local/share/canopy/canopy.db
    /// - macOS: ~/Library/Application Support/canopy/canopy.db
    /// - Windows: %APPDATA%\canopy\canopy.db
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoDirectory("data"))?;
        path.push("canopy");
        path.push("canopy.db");
        Ok(path)
    }
}
