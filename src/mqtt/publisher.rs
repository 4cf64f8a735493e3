//! Best-effort publish path
//!
//! Every publish first probes the link. While the device is offline messages are
//! dropped and logged, never queued or retried, so telemetry produced during an
//! outage is simply lost.

use super::connection::ConnectHook;
use super::topics::BEACON_TOPIC;
use super::transport::Transport;
use crate::device::model::BeaconAnnouncement;
use crate::device::state::DeviceState;
use crate::device::DeviceIdentity;
use async_trait::async_trait;
use rumqttc::QoS;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// What happened to a single publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    /// Link was down or the device is shutting down
    Dropped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> PublishOutcome {
        if self.cancel.is_cancelled() {
            debug!("Shutting down, dropping message for {}", topic);
            return PublishOutcome::Dropped;
        }
        if !self.transport.is_alive().await {
            debug!("Not connected, dropping message for {}", topic);
            return PublishOutcome::Dropped;
        }

        match self.transport.publish(topic, payload, qos).await {
            Ok(()) => PublishOutcome::Sent,
            Err(e) => {
                error!("Publishing to {} failed: {}", topic, e);
                PublishOutcome::Failed
            }
        }
    }

    pub async fn publish_json<T: Serialize>(&self, topic: &str, message: &T, qos: QoS) -> PublishOutcome {
        match serde_json::to_vec(message) {
            Ok(payload) => self.publish(topic, payload, qos).await,
            Err(e) => {
                error!("Failed to serialize message for {}: {}", topic, e);
                PublishOutcome::Failed
            }
        }
    }
}

/// Publishes the device's [`BeaconAnnouncement`]; used after connecting and on ping
#[derive(Debug, Clone)]
pub struct Beacon {
    identity: Arc<DeviceIdentity>,
    state: Arc<DeviceState>,
    publisher: Publisher,
}

impl Beacon {
    pub fn new(identity: Arc<DeviceIdentity>, state: Arc<DeviceState>, publisher: Publisher) -> Self {
        Self {
            identity,
            state,
            publisher,
        }
    }

    pub async fn announce(&self) -> PublishOutcome {
        let beacon = BeaconAnnouncement::capture(&self.identity, &self.state);
        debug!("Publishing beacon for {}", self.identity);
        self.publisher
            .publish_json(BEACON_TOPIC, &beacon, QoS::AtMostOnce)
            .await
    }
}

#[async_trait]
impl ConnectHook for Beacon {
    async fn on_connect(&self) {
        self.announce().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceType;
    use crate::mqtt::mock::{Call, MockTransport};

    fn publisher(transport: &Arc<MockTransport>) -> (Publisher, CancellationToken) {
        let cancel = CancellationToken::new();
        (Publisher::new(transport.clone(), cancel.clone()), cancel)
    }

    #[tokio::test]
    async fn drops_silently_while_disconnected() {
        let transport = Arc::new(MockTransport::new());
        let (publisher, _cancel) = publisher(&transport);

        let outcome = publisher
            .publish("telemetry", b"{}".to_vec(), QoS::AtMostOnce)
            .await;

        assert_eq!(outcome, PublishOutcome::Dropped);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn sends_when_alive() {
        let transport = Arc::new(MockTransport::new());
        transport.set_alive(true);
        let (publisher, _cancel) = publisher(&transport);

        let outcome = publisher
            .publish("telemetry", b"{}".to_vec(), QoS::AtMostOnce)
            .await;

        assert_eq!(outcome, PublishOutcome::Sent);
        assert_eq!(
            transport.calls(),
            vec![Call::Publish("telemetry".to_string(), b"{}".to_vec(), QoS::AtMostOnce)]
        );
    }

    #[tokio::test]
    async fn nothing_is_sent_after_cancellation() {
        let transport = Arc::new(MockTransport::new());
        transport.set_alive(true);
        let (publisher, cancel) = publisher(&transport);
        cancel.cancel();

        let outcome = publisher
            .publish("telemetry", b"{}".to_vec(), QoS::AtMostOnce)
            .await;

        assert_eq!(outcome, PublishOutcome::Dropped);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn beacon_reflects_current_state() {
        let transport = Arc::new(MockTransport::new());
        transport.set_alive(true);
        let (publisher, _cancel) = publisher(&transport);
        let identity = Arc::new(DeviceIdentity::new("gen-1", DeviceType::Generator));
        let state = Arc::new(DeviceState::new("On", 5).unwrap());
        let beacon = Beacon::new(identity, state.clone(), publisher);

        state.set_operating_state("Off");
        state.set_collection_interval(9).unwrap();
        assert_eq!(beacon.announce().await, PublishOutcome::Sent);

        let published = transport.published_to(BEACON_TOPIC);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["id"], "gen-1");
        assert_eq!(published[0]["type"], "Generator");
        assert_eq!(published[0]["state"], "Off");
        assert_eq!(published[0]["collectionInterval"], 9);
    }
}
