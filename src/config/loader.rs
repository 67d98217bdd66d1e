//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::LogmonConfig;

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".logmon.toml";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
    /// Whether a missing file is an error instead of falling back to defaults.
    required: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];

        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("logmon").join("config.toml"));
        }

        Self {
            search_paths,
            required: false,
        }
    }

    /// Create a config loader for a specific config file path.
    ///
    /// Unlike the default search paths, this file must exist.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
            required: true,
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed or
    /// validated, or if a file given to [`ConfigLoader::with_path`] is missing.
    pub fn load(&self) -> Result<LogmonConfig, ConfigError> {
        let found = if self.required {
            self.search_paths.first().cloned()
        } else {
            self.find_config_file()
        };

        let config = match found {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::load_from_path(&path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                LogmonConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<LogmonConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
