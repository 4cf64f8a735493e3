//! Reconnect loop owning the device's broker session
//!
//! Every [`RECONNECT_INTERVAL`] the manager probes the link. When it is down it
//! connects, re-issues the device's subscriptions in their fixed order and runs
//! the post-connect hook. Failures are logged and retried on the next cycle;
//! only cancellation ends the loop.

use super::config::ConnectOptions;
use super::error::TransportError;
use super::topics::DeviceTopics;
use super::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Runs after every successful connect + subscribe
#[async_trait]
pub trait ConnectHook: Send + Sync {
    async fn on_connect(&self);
}

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    options: ConnectOptions,
    topics: DeviceTopics,
    hook: Arc<dyn ConnectHook>,
    status: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        options: ConnectOptions,
        topics: DeviceTopics,
        hook: Arc<dyn ConnectHook>,
        cancel: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionState::default());
        Self {
            transport,
            options,
            topics,
            hook,
            status,
            cancel,
        }
    }

    /// Observes state transitions of this manager
    pub fn status(&self) -> watch::Receiver<ConnectionState> {
        self.status.subscribe()
    }

    /// Returns only once cancelled
    pub async fn run(self) {
        info!("Connection manager for {} started", self.options.client_id);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.ensure_connected() => {}
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_INTERVAL) => {}
            }
        }
        info!(
            "Cancellation requested, connection manager for {} stopped",
            self.options.client_id
        );
    }

    async fn ensure_connected(&self) {
        if self.transport.is_alive().await {
            return;
        }
        if *self.status.borrow() == ConnectionState::Connected {
            warn!("Connection of {} lost", self.options.client_id);
        }

        self.status.send_replace(ConnectionState::Connecting);
        info!(
            "Attempting to connect {} to MQTT broker {}:{}",
            self.options.client_id, self.options.host, self.options.port
        );

        match self.establish().await {
            Ok(()) => {
                self.status.send_replace(ConnectionState::Connected);
                self.hook.on_connect().await;
            }
            Err(e) => {
                self.status.send_replace(ConnectionState::Failed);
                error!(
                    "MQTT connection attempt for {} failed: {}",
                    self.options.client_id, e
                );
            }
        }
    }

    async fn establish(&self) -> Result<(), TransportError> {
        self.transport.connect(&self.options).await?;
        if let Err(e) = self.subscribe_all().await {
            // A session without subscriptions would never receive commands
            if let Err(disconnect_error) = self.transport.disconnect().await {
                warn!("Dropping half-initialised session failed: {}", disconnect_error);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn subscribe_all(&self) -> Result<(), TransportError> {
        for (topic, qos) in self.topics.subscriptions() {
            self.transport.subscribe(topic, qos).await?;
            info!("MQTT client {} subscribed to topic: {}", self.options.client_id, topic);
        }
        Ok(())
    }
}
