// src/main.rs - Host binary: simulated hardware driven by command lines on stdin
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use hexapod_rs::hardware::simulated::SimulatedRig;
use hexapod_rs::{Config, HexapodHost, HostRequest, ModuleKind, load_config};

/// Hexapod locomotion host
#[derive(Parser, Debug)]
#[command(name = "hexapod-host", about = "Runs the hexapod locomotion core against simulated hardware.")]
struct Cli {
    /// Path to a TOML config file (defaults to the reference robot)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Module to run
    #[arg(short, long, value_enum, default_value_t = ModuleKind::Mobility)]
    module: ModuleKind,

    /// Maximum log level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Simulate a robot without an orientation sensor
    #[arg(long)]
    no_orientation: bool,

    /// Uniform noise added to every simulated load sample
    #[arg(long, default_value_t = 0)]
    load_noise: i32,

    /// Seed for the simulated load noise
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    tracing::info!("Starting hexapod host");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            tracing::info!("Loading configuration from: {}", path);
            load_config(&path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path, e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };

    let rig = SimulatedRig::for_config(&config, !cli.no_orientation).with_load_noise(cli.load_noise, cli.seed);
    let mut host = HexapodHost::new(config, rig.hardware_set(), cli.module)?;

    let mut notifications = host.subscribe();
    tokio::spawn(async move {
        while let Ok(note) = notifications.recv().await {
            println!("[{}] {}", note.source, note.message);
        }
    });

    let (request_tx, request_rx) = mpsc::channel::<HostRequest>(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if request_tx.send(HostRequest::Command(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received");
            let _ = shutdown_tx.send(());
        }
    });

    host.start();
    tracing::info!("Enter commands as '<module> <command> [args]', e.g. 'mobility lift'");
    host.run(request_rx, shutdown_rx).await;
    host.shutdown().await;

    tracing::info!("Hexapod host stopped");
    Ok(())
}
