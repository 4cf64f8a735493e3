//! JSON payloads exchanged with the broker

use super::state::DeviceState;
use super::{DeviceIdentity, DeviceType};
use serde::{Deserialize, Serialize};

/// Presence announcement, published on every (re)connect and on ping
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconAnnouncement {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub state: String,
    pub collection_interval: u64,
}

impl BeaconAnnouncement {
    /// Snapshot of identity and current state at publish time
    pub fn capture(identity: &DeviceIdentity, state: &DeviceState) -> Self {
        Self {
            id: identity.id.clone(),
            device_type: identity.device_type,
            state: state.operating_state(),
            collection_interval: state.collection_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAttribute {
    pub name: String,
    pub value: f64,
}

impl SensorAttribute {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One telemetry sample, built fresh on every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub attributes: Vec<SensorAttribute>,
}

impl TelemetryReading {
    pub fn new(identity: &DeviceIdentity, attributes: Vec<SensorAttribute>) -> Self {
        Self {
            id: identity.id.clone(),
            device_type: identity.device_type,
            attributes,
        }
    }
}

// Inbound commands also accept PascalCase keys; older controllers send those.

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsCommand {
    #[serde(alias = "CollectionInterval")]
    pub collection_interval: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateChangeCommand {
    #[serde(alias = "Value")]
    pub value: String,
}
