//! Error definitions for the MQTT transport layer

use std::time::Duration;
use thiserror::Error;

/// Failures of connect, subscribe, publish or disconnect calls
///
/// None of these are fatal for a device. The connection manager logs them and
/// retries on its next cycle; the publish path logs and drops the message.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Broker refused or the network link failed during the handshake
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No CONNACK within the handshake deadline
    #[error("Timed out after {0:?} waiting for the broker")]
    Timeout(Duration),

    /// A request was issued while no session exists
    #[error("Not connected")]
    NotConnected,

    /// rumqttc could not enqueue the request
    #[error("Client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
}
