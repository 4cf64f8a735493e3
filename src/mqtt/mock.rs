//! In-memory transport used by the unit tests of the device runtime

use super::config::ConnectOptions;
use super::error::TransportError;
use super::transport::Transport;
use async_trait::async_trait;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Every call that reached the transport, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(String),
    Subscribe(String, QoS),
    Publish(String, Vec<u8>, QoS),
    Disconnect,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    alive: AtomicBool,
    fail_connect: AtomicBool,
    fail_subscribe: AtomicBool,
    publish_delay: Option<Duration>,
    publishing: AtomicUsize,
    max_publishing: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish sleeps for `delay` before completing
    pub fn with_publish_delay(delay: Duration) -> Self {
        Self {
            publish_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribes(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Connect(_)))
            .count()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Subscribe(topic, _) => Some(topic),
                _ => None,
            })
            .collect()
    }

    /// Payloads published to `topic`, parsed as JSON
    pub fn published_to(&self, topic: &str) -> Vec<serde_json::Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish(t, payload, _) if t == topic => serde_json::from_slice(&payload).ok(),
                _ => None,
            })
            .collect()
    }

    /// Highest number of publishes that were in progress at the same time
    pub fn max_concurrent_publishes(&self) -> usize {
        self.max_publishing.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, options: &ConnectOptions) -> Result<(), TransportError> {
        self.record(Call::Connect(options.client_id.clone()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        self.set_alive(true);
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        self.record(Call::Subscribe(topic.to_string(), qos));
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        let running = self.publishing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_publishing.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.publish_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(Call::Publish(topic.to_string(), payload, qos));
        self.publishing.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.record(Call::Disconnect);
        self.set_alive(false);
        Ok(())
    }
}
