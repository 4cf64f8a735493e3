//! Inbound command dispatch
//!
//! Messages arrive on the device's inbound channel. For each one the dispatcher
//! waits for a slot on the process-wide limiter, then hands the message to a
//! tracked task that routes it by topic. The slot stays with that task until the
//! handler finishes, so the limiter capacity bounds handlers in flight across all
//! devices, not just the rate of handoffs.

use super::publisher::Beacon;
use super::topics::{DeviceTopics, Route};
use super::transport::InboundMessage;
use crate::device::model::{SettingsCommand, StateChangeCommand};
use crate::device::state::DeviceState;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Routes a single message to the ping, settings or state handler
#[derive(Debug, Clone)]
pub struct CommandHandler {
    topics: Arc<DeviceTopics>,
    state: Arc<DeviceState>,
    beacon: Beacon,
}

impl CommandHandler {
    pub fn new(topics: DeviceTopics, state: Arc<DeviceState>, beacon: Beacon) -> Self {
        Self {
            topics: Arc::new(topics),
            state,
            beacon,
        }
    }

    pub async fn handle(&self, message: InboundMessage) {
        debug!("Received {:?}", message);

        match self.topics.route(&message.topic) {
            Route::Ping => {
                self.beacon.announce().await;
            }
            Route::Settings => self.apply_settings(&message),
            Route::ChangeState => self.apply_state_change(&message),
            Route::Unknown => debug!("Unknown topic {}", message.topic),
        }
    }

    fn apply_settings(&self, message: &InboundMessage) {
        let command: SettingsCommand = match serde_json::from_slice(&message.payload) {
            Ok(command) => command,
            Err(e) => {
                debug!("Discarding malformed settings on {}: {}", message.topic, e);
                return;
            }
        };
        if let Err(e) = self.state.set_collection_interval(command.collection_interval) {
            debug!("Discarding settings on {}: {}", message.topic, e);
        }
    }

    fn apply_state_change(&self, message: &InboundMessage) {
        match serde_json::from_slice::<StateChangeCommand>(&message.payload) {
            Ok(command) => self.state.set_operating_state(command.value),
            Err(e) => debug!("Discarding malformed state change on {}: {}", message.topic, e),
        }
    }
}

pub struct Dispatcher {
    handler: CommandHandler,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        handler: CommandHandler,
        limiter: Arc<Semaphore>,
        tracker: TaskTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handler,
            limiter,
            tracker,
            cancel,
        }
    }

    /// Drains the inbound channel until cancelled or the transport goes away
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => {
                        debug!("Inbound channel closed");
                        break;
                    }
                },
            };
            if !self.dispatch(message).await {
                break;
            }
        }
        info!("Dispatcher stopped");
    }

    /// Waits for a free slot and spawns the handler.
    ///
    /// Returns `false` when cancellation fired before a slot became free; the
    /// message is dropped in that case.
    pub async fn dispatch(&self, message: InboundMessage) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            permit = self.limiter.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Concurrency limiter closed: {}", e);
                    return false;
                }
            },
        };

        let handler = self.handler.clone();
        self.tracker.spawn(async move {
            handler.handle(message).await;
            drop(permit);
        });
        true
    }
}
