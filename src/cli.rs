use crate::device::DeviceType;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "device-simulator", version, about = "Simulates a fleet of MQTT sensor devices")]
pub struct Cli {
    /// Configuration file; defaults to <config dir>/device-simulator/config.toml
    #[arg(short, long, global = true, env = "DEVICE_SIMULATOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run every configured device until interrupted (default)
    Run,
    /// Write an EMQX user import file and a matching device configuration
    GenerateUsers(GenerateUsersArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GenerateUsersArgs {
    #[arg(long, default_value_t = 10)]
    pub count: usize,

    /// Shared prefix of client id, username and password
    #[arg(long, default_value = "sensor")]
    pub prefix: String,

    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Broker host written into the device configuration
    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[arg(long, default_value_t = 1883)]
    pub port: u16,

    #[arg(long, default_value = "Sensor")]
    pub device_type: DeviceType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_is_the_default() {
        let cli = Cli::try_parse_from(["device-simulator", "--config", "/tmp/sim.toml"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sim.toml")));
    }

    #[test]
    fn generate_users_defaults() {
        let cli = Cli::try_parse_from(["device-simulator", "generate-users"]).unwrap();
        let Some(Command::GenerateUsers(args)) = cli.command else {
            panic!("expected generate-users");
        };
        assert_eq!(args.count, 10);
        assert_eq!(args.prefix, "sensor");
        assert_eq!(args.port, 1883);
        assert_eq!(args.device_type, DeviceType::Sensor);
    }

    #[test]
    fn generate_users_rejects_unknown_device_type() {
        let result = Cli::try_parse_from(["device-simulator", "generate-users", "--device-type", "Toaster"]);
        assert!(result.is_err());
    }
}
