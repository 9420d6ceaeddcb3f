//! Store configuration
//!
//! Loaded from YAML, or from string key/value parameters.

use crate::equality::EqualityMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid parameter {key}: {message}")]
    InvalidParameter { key: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Data store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Treatment of owl:sameAs
    pub equality: EqualityMode,
    /// Materialization worker threads (0 = one per core)
    pub threads: usize,
    /// Window size for query iterators that do not set one
    pub default_window_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            equality: EqualityMode::Off,
            threads: 0,
            default_window_size: 1024,
        }
    }
}

impl StoreConfig {
    pub fn with_equality(mut self, equality: EqualityMode) -> Self {
        self.equality = equality;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: StoreConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Build from `equality`, `threads` and `window-size` parameters
    pub fn from_parameters(parameters: &HashMap<String, String>) -> ConfigResult<Self> {
        let mut config = Self::default();
        for (key, value) in parameters {
            let invalid = |message: String| ConfigError::InvalidParameter {
                key: key.clone(),
                message,
            };
            match key.as_str() {
                "equality" => config.equality = value.parse().map_err(invalid)?,
                "threads" => {
                    config.threads = value
                        .parse()
                        .map_err(|_| invalid(format!("'{}' is not a thread count", value)))?
                }
                "window-size" => {
                    config.default_window_size = value
                        .parse()
                        .map_err(|_| invalid(format!("'{}' is not a window size", value)))?
                }
                _ => return Err(invalid("unknown parameter".to_string())),
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.default_window_size == 0 {
            return Err(ConfigError::InvalidParameter {
                key: "window-size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
