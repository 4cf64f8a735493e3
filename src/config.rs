//! # Startup Configuration
//!
//! Loads the simulator's TOML configuration: process-wide settings plus one
//! `[[devices]]` table per simulated device.
//!
//! ```toml
//! concurrent_processes = 1
//! log_level = "info"
//!
//! [[devices]]
//! client_id = "sensor-0"
//! username = "sensor-0"
//! password = "sensor-0"
//! host = "localhost"
//! device_type = "Weather"
//! ```
//!
//! Every problem found here is fatal and surfaces before any device starts.

use crate::device::DeviceType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, Level};

const CONFIG_DIR: &str = "device-simulator";
const CONFIG_FILE: &str = "config.toml";
const MIN_KEEP_ALIVE_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No devices configured")]
    NoDevices,

    #[error("Device #{0} has an empty client_id")]
    EmptyClientId(usize),

    #[error("Device {client_id}: {reason}")]
    InvalidDevice { client_id: String, reason: String },

    #[error("concurrent_processes must be at least 1")]
    NoProcessors,

    #[error("concurrent_processes must not exceed {max}, got {value}")]
    TooManyProcessors { value: usize, max: usize },

    #[error("Unknown log level: {0}")]
    LogLevel(String),

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Settings for one simulated device
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DeviceSettings {
    pub client_id: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub use_tls: bool,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Initial operating state
    #[serde(default = "default_state")]
    pub state: String,
    /// Initial telemetry interval in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval: i64,
    pub device_type: DeviceType,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SimulatorConfig {
    /// Capacity of the limiter shared by all devices' message handlers
    #[serde(default = "default_concurrent_processes")]
    pub concurrent_processes: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub devices: Vec<DeviceSettings>,
}

fn default_port() -> u16 {
    1883
}

fn default_state() -> String {
    "On".to_string()
}

fn default_collection_interval() -> i64 {
    5
}

fn default_keep_alive() -> u64 {
    MIN_KEEP_ALIVE_SECS
}

fn default_concurrent_processes() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SimulatorConfig {
    /// `<config dir>/device-simulator/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrent_processes == 0 {
            return Err(ConfigError::NoProcessors);
        }
        if self.concurrent_processes > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooManyProcessors {
                value: self.concurrent_processes,
                max: Semaphore::MAX_PERMITS,
            });
        }
        self.log_level()?;
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        for (index, device) in self.devices.iter().enumerate() {
            if device.client_id.trim().is_empty() {
                return Err(ConfigError::EmptyClientId(index));
            }
            let invalid = |reason: &str| ConfigError::InvalidDevice {
                client_id: device.client_id.clone(),
                reason: reason.to_string(),
            };
            if device.host.trim().is_empty() {
                return Err(invalid("host is empty"));
            }
            if device.collection_interval < 1 {
                return Err(invalid("collection_interval must be at least 1 second"));
            }
            if device.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
                return Err(invalid("keep_alive_secs must be at least 5"));
            }
        }
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level).map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}
