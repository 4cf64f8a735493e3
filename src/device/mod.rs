//! # Device Domain
//!
//! Identity, shared runtime state and wire models of a single simulated device,
//! plus the [`worker::DeviceWorker`] that composes the MQTT connection, the
//! command dispatcher and the telemetry loop into one independently running unit.
//!
//! ```text
//! device/
//! ├── state.rs   - DeviceState shared between dispatcher (writer) and telemetry (reader)
//! ├── model.rs   - Beacon / telemetry payloads and inbound command payloads
//! └── worker.rs  - Per-device lifecycle (Configured -> Running -> shut down)
//! ```
//!
//! A device's identity never changes after creation. Everything that can change at
//! runtime lives in [`state::DeviceState`], which is cheap to share behind an `Arc`.

pub mod model;
pub mod state;
pub mod worker;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a simulated device
///
/// Selects the reading generator used by the telemetry loop. Types without a
/// registered generator still connect, announce themselves and accept commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Sensor,
    Weather,
    Generator,
    PowerDelivery,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DeviceType::Sensor => "Sensor",
            DeviceType::Weather => "Weather",
            DeviceType::Generator => "Generator",
            DeviceType::PowerDelivery => "PowerDelivery",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Sensor" => Ok(DeviceType::Sensor),
            "Weather" => Ok(DeviceType::Weather),
            "Generator" => Ok(DeviceType::Generator),
            "PowerDelivery" => Ok(DeviceType::PowerDelivery),
            other => Err(format!("unknown device type: {}", other)),
        }
    }
}

/// Immutable identity of a simulated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: String,
    pub device_type: DeviceType,
}

impl DeviceIdentity {
    pub fn new(id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            device_type,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.device_type)
    }
}

/// Errors raised when device state would be put into an unusable shape
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Collection interval must be at least 1 second, got {0}")]
    InvalidInterval(i64),
}
