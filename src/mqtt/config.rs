use crate::config::DeviceSettings;
use std::time::Duration;

/// Broker address, credentials and session parameters for one device
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub keep_alive: Duration,
}

impl From<&DeviceSettings> for ConnectOptions {
    fn from(settings: &DeviceSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            use_tls: settings.use_tls,
            keep_alive: Duration::from_secs(settings.keep_alive_secs),
        }
    }
}
