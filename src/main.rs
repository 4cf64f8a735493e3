pub mod cli;
pub mod config;
pub mod device;
pub mod mqtt;
pub mod provisioning;
pub mod simulation;

use crate::cli::{Cli, Command};
use crate::config::SimulatorConfig;
use crate::device::worker::{Configured, DeviceWorker, Running};
use crate::simulation::GeneratorRegistry;
use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cli.config).await,
        Command::GenerateUsers(args) => {
            setup_logging(Level::INFO);
            provisioning::write_files(&args).await
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => SimulatorConfig::default_path()?,
    };
    let config = SimulatorConfig::load(&path)
        .wrap_err_with(|| format!("Unable to load configuration from {}", path.display()))?;
    setup_logging(config.log_level()?);

    info!(
        "Application starting with {} devices, {} concurrent processes",
        config.devices.len(),
        config.concurrent_processes
    );

    let cancel = CancellationToken::new();
    let limiter = Arc::new(Semaphore::new(config.concurrent_processes));
    let generators = GeneratorRegistry::default();

    // Build every worker first so a bad device fails startup before anything connects
    let mut configured = Vec::with_capacity(config.devices.len());
    for settings in &config.devices {
        let worker = DeviceWorker::<Configured>::create(
            settings,
            limiter.clone(),
            generators.clone(),
            cancel.child_token(),
        )
        .wrap_err_with(|| format!("Invalid settings for device {}", settings.client_id))?;
        debug!("Created worker for {}", worker.identity());
        configured.push(worker);
    }

    let workers: Vec<DeviceWorker<Running>> = configured
        .into_iter()
        .map(DeviceWorker::<Configured>::start)
        .collect();

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(e) => error!("Unable to listen for interrupt: {}", e),
    }
    cancel.cancel();

    for worker in workers {
        worker.shutdown().await;
    }
    info!("All devices stopped");
    Ok(())
}
