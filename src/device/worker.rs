//! Device Worker - lifecycle of one simulated device
//!
//! Composes the connection manager, the command dispatcher and the telemetry loop
//! around a single transport. The worker is a typed state machine:
//!
//! ```text
//! DeviceWorker<Configured> ──start()──► DeviceWorker<Running> ──shutdown()──► (disconnected)
//! ```
//!
//! All activities of a device, including in-flight command handlers, are spawned
//! on one [`TaskTracker`]. `shutdown` cancels the device, waits for every tracked
//! task and only then disconnects the transport.

use super::state::DeviceState;
use super::{DeviceError, DeviceIdentity};
use crate::config::DeviceSettings;
use crate::mqtt::client::RumqttTransport;
use crate::mqtt::config::ConnectOptions;
use crate::mqtt::connection::{ConnectionManager, ConnectionState};
use crate::mqtt::dispatcher::{CommandHandler, Dispatcher};
use crate::mqtt::publisher::{Beacon, Publisher};
use crate::mqtt::topics::DeviceTopics;
use crate::mqtt::transport::{InboundMessage, Transport};
use crate::simulation::telemetry::TelemetryLoop;
use crate::simulation::GeneratorRegistry;
use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const INBOUND_CAPACITY: usize = 64;

#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Configured,
    Running,
}

#[machine]
#[derive(Debug)]
pub struct DeviceWorker<S: WorkerState> {
    identity: Arc<DeviceIdentity>,
    state: Arc<DeviceState>,
    options: ConnectOptions,
    transport: Arc<dyn Transport>,

    // Taken by the dispatcher on start
    inbound: Option<mpsc::Receiver<InboundMessage>>,

    // Process-wide, shared with every other device
    limiter: Arc<Semaphore>,

    generators: GeneratorRegistry,
    cancel: CancellationToken,
    tracker: TaskTracker,
    connection_status: Option<watch::Receiver<ConnectionState>>,
}

impl<S: WorkerState> DeviceWorker<S> {
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn device_state(&self) -> Arc<DeviceState> {
        self.state.clone()
    }
}

impl DeviceWorker<Configured> {
    /// Worker talking to a real broker through rumqttc
    pub fn create(
        settings: &DeviceSettings,
        limiter: Arc<Semaphore>,
        generators: GeneratorRegistry,
        cancel: CancellationToken,
    ) -> Result<Self, DeviceError> {
        let (transport, inbound) = RumqttTransport::channel(INBOUND_CAPACITY);
        Self::with_transport(settings, Arc::new(transport), inbound, limiter, generators, cancel)
    }

    pub fn with_transport(
        settings: &DeviceSettings,
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<InboundMessage>,
        limiter: Arc<Semaphore>,
        generators: GeneratorRegistry,
        cancel: CancellationToken,
    ) -> Result<Self, DeviceError> {
        let identity = Arc::new(DeviceIdentity::new(settings.client_id.clone(), settings.device_type));
        let state = Arc::new(DeviceState::new(settings.state.clone(), settings.collection_interval)?);
        debug!(
            "Configured device {} for broker {}:{}",
            identity, settings.host, settings.port
        );

        Ok(Self::new(
            identity,
            state,
            ConnectOptions::from(settings),
            transport,
            Some(inbound),
            limiter,
            generators,
            cancel,
            TaskTracker::new(),
            None,
        ))
    }

    /// Spawns the connection manager, dispatcher and telemetry loop
    pub fn start(mut self) -> DeviceWorker<Running> {
        info!("Starting device {}", self.identity);

        let topics = DeviceTopics::for_device(&self.identity.id);
        let publisher = Publisher::new(self.transport.clone(), self.cancel.clone());
        let beacon = Beacon::new(self.identity.clone(), self.state.clone(), publisher.clone());

        let manager = ConnectionManager::new(
            self.transport.clone(),
            self.options.clone(),
            topics.clone(),
            Arc::new(beacon.clone()),
            self.cancel.clone(),
        );
        self.connection_status = Some(manager.status());
        self.tracker.spawn(manager.run());

        match self.inbound.take() {
            Some(inbound) => {
                let dispatcher = Dispatcher::new(
                    CommandHandler::new(topics, self.state.clone(), beacon),
                    self.limiter.clone(),
                    self.tracker.clone(),
                    self.cancel.clone(),
                );
                self.tracker.spawn(dispatcher.run(inbound));
            }
            None => warn!("Inbound channel of {} already consumed", self.identity),
        }

        let telemetry = TelemetryLoop::new(
            self.identity.clone(),
            self.state.clone(),
            self.generators.generator_for(self.identity.device_type),
            publisher,
            self.cancel.clone(),
        );
        self.tracker.spawn(telemetry.run());

        self.transition()
    }
}

impl DeviceWorker<Running> {
    pub fn connection_status(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.connection_status.clone()
    }

    /// Stops all activities of the device and releases its broker session
    pub async fn shutdown(self) {
        info!("Stopping device {}", self.identity);
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        if let Err(e) = self.transport.disconnect().await {
            warn!("Disconnecting {} failed: {}", self.identity, e);
        }
        info!("Device {} stopped", self.identity);
    }
}
