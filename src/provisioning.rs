//! Broker user provisioning
//!
//! Generates a batch of numbered device users together with the two files needed
//! to run them: an EMQX user import CSV and a simulator configuration with one
//! device per user.

use crate::cli::GenerateUsersArgs;
use crate::config::{DeviceSettings, SimulatorConfig};
use crate::device::DeviceType;
use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing::info;

pub const USERS_CSV_FILE: &str = "emqx_users_import.csv";
pub const DEVICES_FILE: &str = "devices.toml";

/// Credentials for one generated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUser {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

pub fn generate_users(prefix: &str, count: usize) -> Vec<GeneratedUser> {
    (0..count)
        .map(|i| {
            let name = format!("{}-{}", prefix, i);
            GeneratedUser {
                client_id: name.clone(),
                username: name.clone(),
                password: name,
            }
        })
        .collect()
}

/// `user_id,password,is_superuser` rows as expected by the EMQX importer
pub fn emqx_users_csv(users: &[GeneratedUser]) -> String {
    let mut csv = String::from("user_id,password,is_superuser\n");
    for user in users {
        csv.push_str(&format!("{},{},false\n", user.username, user.password));
    }
    csv
}

/// Rows are written unquoted, so fields must not need CSV quoting
fn is_plain_csv_field(field: &str) -> bool {
    !field.contains([',', '"', '\n', '\r'])
}

pub fn device_config(users: &[GeneratedUser], host: &str, port: u16, device_type: DeviceType) -> SimulatorConfig {
    let devices = users
        .iter()
        .map(|user| DeviceSettings {
            client_id: user.client_id.clone(),
            username: user.username.clone(),
            password: user.password.clone(),
            use_tls: false,
            host: host.to_string(),
            port,
            state: "On".to_string(),
            collection_interval: 5,
            device_type,
            keep_alive_secs: 5,
        })
        .collect();

    SimulatorConfig {
        concurrent_processes: 1,
        log_level: "info".to_string(),
        devices,
    }
}

pub async fn write_files(args: &GenerateUsersArgs) -> Result<()> {
    if !is_plain_csv_field(&args.prefix) {
        return Err(eyre!(
            "User prefix must not contain commas, quotes or line breaks: {:?}",
            args.prefix
        ));
    }
    let users = generate_users(&args.prefix, args.count);
    let config = device_config(&users, &args.host, args.port, args.device_type);

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .map_err(|e| eyre!("Failed to create {}: {}", args.out_dir.display(), e))?;

    write_file(&args.out_dir.join(USERS_CSV_FILE), emqx_users_csv(&users)).await?;

    let devices_content = toml::to_string_pretty(&config)
        .map_err(|e| eyre!("Failed to serialize device configuration: {}", e))?;
    write_file(&args.out_dir.join(DEVICES_FILE), devices_content).await?;

    info!(
        "Generated {} users in {}",
        users.len(),
        args.out_dir.display()
    );
    Ok(())
}

async fn write_file(path: &Path, content: String) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_are_numbered_from_zero() {
        let users = generate_users("sensor", 3);
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].client_id, "sensor-0");
        assert_eq!(users[2].username, "sensor-2");
        assert_eq!(users[2].password, "sensor-2");
    }

    #[test]
    fn csv_has_header_and_one_row_per_user() {
        let csv = emqx_users_csv(&generate_users("sensor", 2));
        assert_eq!(
            csv,
            "user_id,password,is_superuser\nsensor-0,sensor-0,false\nsensor-1,sensor-1,false\n"
        );
    }

    #[tokio::test]
    async fn prefixes_that_need_quoting_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for prefix in ["a,b", "say \"hi\"", "line\nbreak", "cr\rlf"] {
            let args = GenerateUsersArgs {
                count: 1,
                prefix: prefix.to_string(),
                out_dir: dir.path().to_path_buf(),
                host: "localhost".to_string(),
                port: 1883,
                device_type: DeviceType::Sensor,
            };
            assert!(write_files(&args).await.is_err(), "accepted {:?}", prefix);
        }
        assert!(!dir.path().join(USERS_CSV_FILE).exists());
    }

    #[tokio::test]
    async fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let args = GenerateUsersArgs {
            count: 4,
            prefix: "weather".to_string(),
            out_dir: dir.path().to_path_buf(),
            host: "broker.local".to_string(),
            port: 8883,
            device_type: DeviceType::Weather,
        };
        write_files(&args).await.unwrap();

        let config = SimulatorConfig::load(&dir.path().join(DEVICES_FILE)).unwrap();
        assert_eq!(config.devices.len(), 4);
        assert_eq!(config.devices[3].client_id, "weather-3");
        assert_eq!(config.devices[0].port, 8883);
        assert_eq!(config.devices[0].device_type, DeviceType::Weather);

        let csv = std::fs::read_to_string(dir.path().join(USERS_CSV_FILE)).unwrap();
        assert_eq!(csv.lines().count(), 5);
    }

    #[tokio::test]
    async fn zero_users_cannot_produce_a_runnable_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = GenerateUsersArgs {
            count: 0,
            prefix: "sensor".to_string(),
            out_dir: dir.path().to_path_buf(),
            host: "localhost".to_string(),
            port: 1883,
            device_type: DeviceType::Sensor,
        };
        write_files(&args).await.unwrap();
        assert!(SimulatorConfig::load(&dir.path().join(DEVICES_FILE)).is_err());
    }
}
