//! # MQTT Integration Module
//!
//! Connection handling, command dispatch and the publish path for simulated devices.
//! Each device owns one broker session; all of the pieces below are instantiated
//! per device by [`crate::device::worker::DeviceWorker`].
//!
//! ## Why This Module Exists
//!
//! A simulated device has to behave like a real one on the bus: stay connected
//! through broker outages, answer pings, accept settings and state commands, and
//! keep publishing telemetry. This module provides exactly that plumbing:
//! - A reconnect loop that restores the session and its subscriptions
//! - A dispatcher that routes inbound commands under a concurrency limit
//! - A lossy publish path that never blocks on a dead link
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs       - Broker address, credentials and session parameters
//! ├── topics.rs       - Per-device topic namespace and routing
//! ├── transport.rs    - Transport trait (the broker seam)
//! ├── client.rs       - rumqttc implementation of the transport
//! ├── connection.rs   - Reconnect loop and post-connect hook
//! ├── dispatcher.rs   - Inbound command routing and limiter
//! ├── publisher.rs    - Best-effort publishing and beacon announcements
//! └── error.rs        - Transport error type
//! ```
//!
//! ## Design Philosophy
//!
//! - **Broker-agnostic core**: everything above [`transport::Transport`] is tested
//!   against an in-memory transport
//! - **Errors stay local**: transport and payload errors are logged and the device
//!   keeps running in a degraded mode
//! - **Prompt shutdown**: every wait selects on the device's cancellation token

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod publisher;
pub mod topics;
pub mod transport;

#[cfg(test)]
pub mod mock;
