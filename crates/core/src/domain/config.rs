//! Configuration for the calibration tool
//!
//! This module provides:
//! - Application settings (front end, playback poll interval)
//! - Starting values for the parameter store, applied through its validation
//! - An optional noise seed for reproducible noise
//!
//! Configuration is read-only: the tool never writes settings back.

use crate::domain::params::{ParamError, ParamId, ParameterStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which interactive front end to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontEnd {
    /// Full-screen terminal menu
    #[default]
    Tui,
    /// Line-based prompt
    Line,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interval for polling playback state, in milliseconds
    pub poll_interval_ms: u64,

    pub front_end: FrontEnd,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            front_end: FrontEnd::Tui,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Starting values for the output device parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub device_id: Option<i64>,
    pub sample_rate: Option<f64>,
    pub channels: Option<i64>,
    pub output_channel: Option<i64>,
}

/// Noise generator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Fixed seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrateConfig {
    pub app: AppConfig,
    pub device: DeviceConfig,
    pub noise: NoiseConfig,
    /// Starting values for any parameter, keyed by parameter name
    pub parameters: BTreeMap<String, toml::Value>,
}

impl CalibrateConfig {
    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.app.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "app.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        for name in self.parameters.keys() {
            name.parse::<ParamId>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Starting values as (parameter, raw text) pairs, device section first
    fn starting_values(&self) -> Vec<(ParamId, String)> {
        let device = [
            (ParamId::DeviceId, self.device.device_id.map(|v| v.to_string())),
            (ParamId::SampleRate, self.device.sample_rate.map(|v| v.to_string())),
            (ParamId::Channels, self.device.channels.map(|v| v.to_string())),
            (
                ParamId::OutputChannel,
                self.device.output_channel.map(|v| v.to_string()),
            ),
        ];

        let mut values: Vec<(ParamId, String)> = device
            .into_iter()
            .filter_map(|(id, raw)| raw.map(|raw| (id, raw)))
            .collect();

        for (name, value) in &self.parameters {
            let Ok(id) = name.parse::<ParamId>() else {
                continue;
            };
            let raw = match value {
                toml::Value::Integer(v) => v.to_string(),
                toml::Value::Float(v) => v.to_string(),
                toml::Value::String(v) => v.clone(),
                other => other.to_string(),
            };
            values.push((id, raw));
        }
        values
    }

    /// Apply starting values through the store's validation
    ///
    /// Rejected values are logged and returned; the store keeps its
    /// previous value for them.
    pub fn apply_starting_values(&self, params: &mut ParameterStore) -> Vec<(ParamId, ParamError)> {
        let mut rejected = Vec::new();
        for (id, raw) in self.starting_values() {
            match params.set(id, &raw) {
                Ok(_) => debug!(param = %id, value = %raw, "Applied starting value"),
                Err(e) => {
                    warn!(param = %id, error = %e, "Ignoring configured starting value");
                    rejected.push((id, e));
                }
            }
        }
        rejected
    }
}

/// Locates and loads the configuration file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for an explicit config file path
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Manager for `config.toml` inside `config_dir`
    pub fn from_dir(config_dir: PathBuf) -> Self {
        Self::new(config_dir.join("config.toml"))
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/calibrate` on Linux
    /// Returns `%APPDATA%\calibrate` on Windows
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("calibrate"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration file if there is one
    ///
    /// A missing file is `Ok(None)`; an unreadable or invalid file is an error.
    #[instrument(skip(self))]
    pub async fn try_load(&self) -> Result<Option<CalibrateConfig>> {
        if !fs::try_exists(&self.config_path).await? {
            info!(
                path = %self.config_path.display(),
                "Config file not found, using defaults"
            );
            return Ok(None);
        }
        CalibrateConfig::load_from_file(&self.config_path)
            .await
            .map(Some)
    }

    /// Load configuration, falling back to defaults
    ///
    /// If the config file doesn't exist, returns defaults.
    /// If the config file is corrupt, logs an error and returns defaults.
    pub async fn load(&self) -> CalibrateConfig {
        match self.try_load().await {
            Ok(Some(config)) => config,
            Ok(None) => CalibrateConfig::default(),
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );
                CalibrateConfig::default()
            }
        }
    }
}
