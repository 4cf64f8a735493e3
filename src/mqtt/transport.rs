//! Transport seam between the device runtime and the broker client
//!
//! Everything above this trait (connection manager, dispatcher, telemetry loop)
//! is broker-agnostic and is tested against an in-memory transport. The production
//! implementation lives in [`super::client::RumqttTransport`].

use super::config::ConnectOptions;
use super::error::TransportError;
use async_trait::async_trait;
use rumqttc::QoS;
use std::fmt;

/// A PUBLISH received from the broker
#[derive(Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InboundMessage {{ topic: {}, payload: {} }}",
            self.topic,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

/// Broker connection as seen by a single device
///
/// Implementations must tolerate concurrent `is_alive` and `publish` calls from
/// several tasks while the connection manager connects or subscribes.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Opens a fresh session, replacing any previous one
    async fn connect(&self, options: &ConnectOptions) -> Result<(), TransportError>;

    /// Lightweight liveness probe; never performs a reconnect
    async fn is_alive(&self) -> bool;

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError>;

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError>;

    /// Closes the session; a no-op when nothing is connected
    async fn disconnect(&self) -> Result<(), TransportError>;
}
