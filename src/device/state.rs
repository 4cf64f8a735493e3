//! Mutable device state shared between the command dispatcher and the telemetry loop.
//!
//! Both fields are independent scalars, so each is updated on its own without a
//! cross-field lock. The interval is an atomic; the operating state string sits in
//! a `watch` channel, which gives last-writer-wins replacement without poisoning.

use super::DeviceError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug)]
pub struct DeviceState {
    operating_state: watch::Sender<String>,
    collection_interval_secs: AtomicU64,
}

impl DeviceState {
    /// Creates the state, rejecting a non-positive collection interval
    pub fn new(operating_state: impl Into<String>, collection_interval_secs: i64) -> Result<Self, DeviceError> {
        let interval = validate_interval(collection_interval_secs)?;
        let (operating_state, _) = watch::channel(operating_state.into());
        Ok(Self {
            operating_state,
            collection_interval_secs: AtomicU64::new(interval),
        })
    }

    pub fn operating_state(&self) -> String {
        self.operating_state.borrow().clone()
    }

    pub fn set_operating_state(&self, value: impl Into<String>) {
        let value = value.into();
        debug!("Operating state changed to {}", value);
        self.operating_state.send_replace(value);
    }

    pub fn collection_interval_secs(&self) -> u64 {
        self.collection_interval_secs.load(Ordering::Acquire)
    }

    /// Wait duration for the next telemetry cycle
    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs())
    }

    /// Overwrites the interval. Values below one second are rejected and the
    /// previous interval is kept.
    pub fn set_collection_interval(&self, secs: i64) -> Result<(), DeviceError> {
        let interval = validate_interval(secs)?;
        self.collection_interval_secs.store(interval, Ordering::Release);
        debug!("Collection interval changed to {}s", interval);
        Ok(())
    }
}

fn validate_interval(secs: i64) -> Result<u64, DeviceError> {
    if secs < 1 {
        return Err(DeviceError::InvalidInterval(secs));
    }
    Ok(secs as u64)
}
