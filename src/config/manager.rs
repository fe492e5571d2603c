//! Configuration manager for loading and saving application configuration
//!
//! This module provides functionality to load and save configuration to
//! `<config dir>/QuickLaunch/config.json` with atomic writes to prevent corruption.

use crate::config::models::Config;
use crate::error::{QuickLaunchError, Result, StringError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "QUICKLAUNCH_CONFIG_DIR";

/// Durable backend for the configuration document
///
/// The catalog store only ever reads and writes the whole document, so this
/// is the single persistence seam; tests substitute failing or in-memory stores.
pub trait ConfigStore: Send + Sync {
    /// Load the document, falling back to defaults when none exists
    fn load(&self) -> Result<Config>;

    /// Durably replace the document. Failures are reported as `Persistence`.
    fn save(&self, config: &Config) -> Result<()>;
}

/// JSON file backed configuration store
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for an explicit document path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a manager for `config.json` in the default configuration directory
    pub fn at_default_location() -> Self {
        Self::new(Self::default_config_dir().join("config.json"))
    }

    /// Get the default configuration directory
    ///
    /// Returns `$QUICKLAUNCH_CONFIG_DIR` if set, otherwise the platform config
    /// directory joined with `QuickLaunch` (e.g. `%APPDATA%\QuickLaunch`).
    pub fn default_config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("QuickLaunch")
    }

    /// Path of the managed document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn config_dir(&self) -> Result<&Path> {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| {
                QuickLaunchError::Persistence(StringError::new(format!(
                    "Invalid config path: {}",
                    self.path.display()
                )))
            })
    }

    fn write_atomically(&self, config: &Config) -> Result<()> {
        let config_dir = self.config_dir()?;
        std::fs::create_dir_all(config_dir)?;

        // Atomic write: write to temp file in the same directory, then rename
        let json = serde_json::to_string_pretty(config)?;
        let mut temp = tempfile::NamedTempFile::new_in(config_dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ConfigStore for ConfigManager {
    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist or is corrupt, returns default configuration.
    fn load(&self) -> Result<Config> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Configuration file not found, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Config>(&json) {
            Ok(mut config) => {
                config.normalize();
                info!(
                    "Configuration loaded successfully ({} tiles)",
                    config.tiles.len()
                );
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse configuration, using defaults: {}", e);
                Ok(Config::default())
            }
        }
    }

    /// Save configuration to disk with atomic write
    fn save(&self, config: &Config) -> Result<()> {
        self.write_atomically(config).map_err(|e| {
            warn!(
                "Failed to save configuration to {}: {}",
                self.path.display(),
                e
            );
            match e {
                QuickLaunchError::Persistence(_) => e,
                other => QuickLaunchError::Persistence(Box::new(other)),
            }
        })?;
        debug!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
