//! Configuration management for ClipStash
//!
//! This module handles loading, validating, and managing configuration
//! for the daemon and the front-end. All values have defaults so a missing
//! config file is never an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),

    /// Home directory could not be determined
    #[error("HOME directory could not be determined")]
    NoHome,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and model assets
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Daemon configuration
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Model configuration
    #[serde(default)]
    pub models: ModelConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Capture daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address the event stream is served on
    #[serde(default = "default_daemon_address")]
    pub address: String,
}

/// Model asset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Confidence threshold below which the language detector reports
    /// "not code". Dataset-specific; tune per deployed model.
    #[serde(default = "default_detector_threshold")]
    pub detector_threshold: f32,

    /// Tesseract language list, e.g. "eng" or "eng+spa"
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: String,
}

/// Search engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Per-lane result cap multiplier: each lane collects at most
    /// `limit * lane_factor` candidates before the priority merge
    #[serde(default = "default_lane_factor")]
    pub lane_factor: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            daemon: DaemonConfig::default(),
            models: ModelConfig::default(),
            search: SearchConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: default_daemon_address(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_threshold: default_detector_threshold(),
            ocr_languages: default_ocr_languages(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lane_factor: default_lane_factor(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clipboard-manager")
}

fn default_daemon_address() -> String {
    "unix:///tmp/clipboard-daemon.sock".to_string()
}

fn default_detector_threshold() -> f32 {
    5.11
}

fn default_ocr_languages() -> String {
    "eng+spa".to_string()
}

fn default_lane_factor() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the given path, or from the default
    /// locations when no path is specified. A missing file yields the
    /// default configuration.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(p),
            None => Self::find_config_path(),
        };

        let config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(&p)?;
                toml::from_str(&content)?
            }
            Some(p) => {
                return Err(ConfigError::Validation(format!(
                    "config file not found: {}",
                    p.display()
                )))
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Locate the config file: `CLIPSTASH_CONFIG` first, then the data
    /// directory default. Returns `None` when neither exists.
    fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CLIPSTASH_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let default = default_data_dir().join("config.toml");
        default.exists().then_some(default)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if dirs::home_dir().is_none() {
            return Err(ConfigError::NoHome);
        }
        if self.search.lane_factor == 0 {
            return Err(ConfigError::Validation(
                "search.lane_factor must be at least 1".to_string(),
            ));
        }
        if !self.daemon.address.starts_with("unix://") {
            return Err(ConfigError::Validation(format!(
                "unsupported daemon address: {}",
                self.daemon.address
            )));
        }
        Ok(())
    }

    /// Path of the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("clipboard.db")
    }

    /// Directory holding all model assets
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Path of the embedding model
    pub fn embedding_model_path(&self) -> PathBuf {
        self.models_dir().join("ml").join("embedding-model.onnx")
    }

    /// Path of the language detection model; vocab.json, merges.txt and
    /// labels.txt are expected as siblings
    pub fn detector_model_path(&self) -> PathBuf {
        self.models_dir().join("language-detection").join("model.onnx")
    }

    /// User-local tessdata directory (falls back to the system path at
    /// OCR init time)
    pub fn tessdata_dir(&self) -> PathBuf {
        self.models_dir().join("tessdata")
    }
}
