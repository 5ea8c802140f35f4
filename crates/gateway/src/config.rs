//! Configuration management for the volumegate gateway.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/volumegate/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("volume root must not be empty")]
    EmptyVolumeRoot,

    #[error("max_content_length must be greater than 0, got {0}")]
    InvalidMaxContentLength(u64),

    #[error("encrypted_suffix must start with '.' and name an extension, got {0:?}")]
    InvalidEncryptedSuffix(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Default request size cap: 5 GiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 5 * 1024 * 1024 * 1024;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Process-level settings.
    pub gateway: GatewayConfig,

    /// The sandboxed volume.
    pub volume: VolumeConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Directory holding the credentials record.
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Optional log file, written in addition to stderr.
    pub log_file: Option<PathBuf>,
}

/// Volume settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VolumeConfig {
    /// Sandbox root. Every file operation stays beneath it.
    pub root: PathBuf,

    /// Filename suffix marking encrypted files.
    pub encrypted_suffix: String,

    /// Maximum accepted upload payload in bytes.
    pub max_content_length: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/volume"),
            encrypted_suffix: protocol::ENCRYPTED_SUFFIX.to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("volumegate")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("volumegate")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - VOLUMEGATE_VOLUME: Override the volume root
    /// - VOLUMEGATE_DATA_DIR: Override the data directory
    /// - VOLUMEGATE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("VOLUMEGATE_VOLUME") {
            if !root.is_empty() {
                tracing::info!("Overriding volume root from environment: {}", root);
                self.volume.root = PathBuf::from(root);
            }
        }

        if let Ok(dir) = std::env::var("VOLUMEGATE_DATA_DIR") {
            if !dir.is_empty() {
                tracing::info!("Overriding data_dir from environment: {}", dir);
                self.gateway.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(level) = std::env::var("VOLUMEGATE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.gateway.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.volume.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyVolumeRoot);
        }

        if self.volume.max_content_length == 0 {
            return Err(ConfigError::InvalidMaxContentLength(
                self.volume.max_content_length,
            ));
        }

        let suffix = &self.volume.encrypted_suffix;
        if suffix.len() < 2 || !suffix.starts_with('.') || suffix.contains(['/', '\\']) {
            return Err(ConfigError::InvalidEncryptedSuffix(suffix.clone()));
        }

        let level = self.gateway.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.gateway.log_level.clone()));
        }

        Ok(())
    }

    /// Path of the credentials record inside the data directory.
    pub fn credentials_path(&self) -> PathBuf {
        self.gateway.data_dir.join("credentials.json")
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
