//! Pipeline configuration
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults; command-line flags override both.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows per processing batch. Affects runtime and memory only; the
    /// output tables are identical for any batch size.
    pub batch_size: usize,

    /// Directory the star-schema tables are written to
    pub output_dir: PathBuf,

    /// Tag taxonomy workbook; tag matching degrades to a no-op when absent
    pub taxonomy_path: Option<PathBuf>,

    /// Company registry CSV; registry strategies degrade to no-ops when absent
    pub registry_path: Option<PathBuf>,

    /// Entity_Domain value stamped on entity dimension rows
    pub entity_domain: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            output_dir: PathBuf::from("data/star_schema"),
            taxonomy_path: None,
            registry_path: None,
            entity_domain: "Healthcare".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("NEWSCUBE_BATCH_SIZE") {
            config.batch_size = size.parse().map_err(|_| ConfigError::InvalidValue {
                key: "NEWSCUBE_BATCH_SIZE".to_string(),
                value: size,
            })?;
        }
        if let Ok(dir) = std::env::var("NEWSCUBE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("NEWSCUBE_TAXONOMY") {
            config.taxonomy_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("NEWSCUBE_REGISTRY") {
            config.registry_path = Some(PathBuf::from(path));
        }
        if let Ok(domain) = std::env::var("NEWSCUBE_ENTITY_DOMAIN") {
            config.entity_domain = domain;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        if config.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NEWSCUBE_BATCH_SIZE".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        if config.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch_size".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
