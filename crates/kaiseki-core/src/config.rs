//! Kaiseki configuration management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Remote analysis/verification service endpoints
    pub service: ServiceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("KAISEKI_BASE_URL") {
            config.service.base_url = url;
        }
        if let Ok(timeout) = std::env::var("KAISEKI_TIMEOUT_SECS") {
            config.service.timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "KAISEKI_TIMEOUT_SECS".to_string(),
                    value: timeout,
                })?;
        }
        if let Ok(attempts) = std::env::var("KAISEKI_SEGMENT_RETRIES") {
            config.service.segment_retry_attempts =
                attempts.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "KAISEKI_SEGMENT_RETRIES".to_string(),
                    value: attempts,
                })?;
        }
        if let Ok(delay) = std::env::var("KAISEKI_SEGMENT_RETRY_DELAY_MS") {
            config.service.segment_retry_delay_ms =
                delay.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "KAISEKI_SEGMENT_RETRY_DELAY_MS".to_string(),
                    value: delay,
                })?;
        }
        if let Ok(threshold) = std::env::var("KAISEKI_PRED_THRESHOLD") {
            config.service.pred_threshold =
                threshold.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "KAISEKI_PRED_THRESHOLD".to_string(),
                    value: threshold,
                })?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
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

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the analysis service
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Bounded retry for the initial full-sentence segmentation call
    pub segment_retry_attempts: u32,

    /// Fixed delay between segmentation retries, in milliseconds
    pub segment_retry_delay_ms: u64,

    /// Ranking/filter parameter forwarded as-is to cell expansion
    pub pred_threshold: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
            segment_retry_attempts: 3,
            segment_retry_delay_ms: 600,
            pred_threshold: 1,
        }
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
