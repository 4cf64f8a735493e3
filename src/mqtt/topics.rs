//! Per-device topic namespace and inbound routing

use rumqttc::QoS;

pub const PING_TOPIC: &str = "device/outbound/ping";
pub const BEACON_TOPIC: &str = "device/inbound/beacon";
pub const TELEMETRY_TOPIC: &str = "telemetry";

/// Handler an inbound topic maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ping,
    Settings,
    ChangeState,
    Unknown,
}

/// Topics a single device listens on, with `{id}` already substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    pub ping: String,
    pub settings: String,
    pub change_state: String,
}

impl DeviceTopics {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            ping: PING_TOPIC.to_string(),
            settings: format!("device/outbound/{}/settings", device_id),
            change_state: format!("device/outbound/{}/changestate", device_id),
        }
    }

    /// Subscriptions issued after every (re)connect, always in this order
    pub fn subscriptions(&self) -> [(&str, QoS); 3] {
        [
            (self.ping.as_str(), QoS::AtLeastOnce),
            (self.settings.as_str(), QoS::AtLeastOnce),
            (self.change_state.as_str(), QoS::AtLeastOnce),
        ]
    }

    /// Exact-match routing; anything else is [`Route::Unknown`]
    pub fn route(&self, topic: &str) -> Route {
        if topic == self.ping {
            Route::Ping
        } else if topic == self.settings {
            Route::Settings
        } else if topic == self.change_state {
            Route::ChangeState
        } else {
            Route::Unknown
        }
    }
}
