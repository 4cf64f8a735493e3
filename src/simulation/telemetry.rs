//! Periodic telemetry emission
//!
//! The wait before each tick is read from [`DeviceState`] when the wait starts,
//! so an interval change applies from the next cycle on. Missed ticks are never
//! caught up.

use super::ReadingGenerator;
use crate::device::model::TelemetryReading;
use crate::device::state::DeviceState;
use crate::device::DeviceIdentity;
use crate::mqtt::publisher::{PublishOutcome, Publisher};
use crate::mqtt::topics::TELEMETRY_TOPIC;
use chrono::{Local, Timelike};
use rumqttc::QoS;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct TelemetryLoop {
    identity: Arc<DeviceIdentity>,
    state: Arc<DeviceState>,
    generator: Option<Arc<dyn ReadingGenerator>>,
    publisher: Publisher,
    cancel: CancellationToken,
}

impl TelemetryLoop {
    pub fn new(
        identity: Arc<DeviceIdentity>,
        state: Arc<DeviceState>,
        generator: Option<Arc<dyn ReadingGenerator>>,
        publisher: Publisher,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identity,
            state,
            generator,
            publisher,
            cancel,
        }
    }

    pub async fn run(self) {
        if self.generator.is_none() {
            info!("No reading generator for {}, telemetry ticks are idle", self.identity);
        }
        loop {
            let wait = self.state.collection_interval();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            self.tick().await;
        }
        info!("Telemetry loop for {} stopped", self.identity.id);
    }

    /// Produces and publishes one reading. `None` when the device type has no generator.
    pub async fn tick(&self) -> Option<PublishOutcome> {
        let generator = self.generator.as_ref()?;
        let reading = TelemetryReading::new(&self.identity, generator.generate(Local::now().hour()));
        debug!("Publishing telemetry for {}: {:?}", self.identity.id, reading.attributes);
        Some(
            self.publisher
                .publish_json(TELEMETRY_TOPIC, &reading, QoS::AtMostOnce)
                .await,
        )
    }
}
