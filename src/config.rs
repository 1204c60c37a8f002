//! Tooling configuration.
//!
//! TOML configuration for the command-line tools. Embedders wire the index
//! components directly and do not go through this module.

use crate::error::IndexError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Where the usage store database lives. None means the platform data
    /// directory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IndexConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IndexError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            IndexError::Config(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Load the default config file if one exists, otherwise defaults.
    ///
    /// Looks for `config.toml` in the platform config directory.
    pub fn load_default() -> Result<Self, IndexError> {
        let Some(project_dirs) = directories::ProjectDirs::from("", "asset-usage", "asset-usage")
        else {
            return Ok(Self::default());
        };
        let path = project_dirs.config_dir().join("config.toml");
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the store path: explicit config value or the platform data
    /// directory.
    pub fn resolve_store_path(&self) -> Result<PathBuf, IndexError> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let project_dirs = directories::ProjectDirs::from("", "asset-usage", "asset-usage")
            .ok_or_else(|| {
                IndexError::Config(
                    "could not determine platform data directory for the usage store".to_string(),
                )
            })?;
        Ok(project_dirs.data_dir().join("usages"))
    }
}
