mod config;

use clap::Parser;
use coordinator::{Coordinator, CoordinatorConfig, CoordinatorState};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Confidential Service Mesh Coordinator process entrypoint.
#[derive(Debug, Parser)]
#[command(name = "coordinatord", about = "Runs the mesh coordinator state machine")]
struct Cli {
    /// Path to the daemon's TOML configuration file.
    #[arg(short = 'c', long, default_value = "./coordinatord.toml")]
    config: PathBuf,

    /// Override the sealed-state path from the config file.
    #[arg(long)]
    sealed_state_path: Option<PathBuf>,

    /// Override the seal-key path from the config file.
    #[arg(long)]
    seal_key_path: Option<PathBuf>,

    /// Override the recovery-data path from the config file.
    #[arg(long)]
    recovery_data_path: Option<PathBuf>,

    /// A manifest file to submit immediately if the coordinator starts with none
    /// sealed. Overrides `manifest_path` in the config file.
    #[arg(short = 'm', long)]
    manifest_path: Option<PathBuf>,

    /// Log level, overriding both the config file and `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut daemon_config = config::load_config_from_path(&cli.config)?;

    if let Some(path) = cli.sealed_state_path {
        daemon_config.sealed_state_path = Some(path);
    }
    if let Some(path) = cli.seal_key_path {
        daemon_config.seal_key_path = Some(path);
    }
    if let Some(path) = cli.recovery_data_path {
        daemon_config.recovery_data_path = Some(path);
    }
    if let Some(path) = cli.manifest_path {
        daemon_config.manifest_path = Some(path);
    }
    if let Some(level) = cli.log_level {
        daemon_config.log_level = level;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&daemon_config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config_path = %cli.config.display(), "starting coordinatord");

    let coordinator = Coordinator::new(CoordinatorConfig {
        sealed_state_path: daemon_config.sealed_state_path.clone(),
        seal_key_path: daemon_config.seal_key_path.clone(),
        recovery_data_path: daemon_config.recovery_data_path.clone(),
    });

    coordinator.start()?;
    info!(state = %coordinator.state(), "coordinator started");

    if coordinator.state() == CoordinatorState::AcceptingManifest {
        if let Some(manifest_path) = &daemon_config.manifest_path {
            let text = std::fs::read_to_string(manifest_path)
                .map_err(|e| anyhow::anyhow!("failed to read manifest {}: {e}", manifest_path.display()))?;
            let parsed: manifest::Manifest = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse manifest {}: {e}", manifest_path.display()))?;
            coordinator.set_manifest(parsed)?;
            info!("manifest accepted, now accepting marble activations");
        }
    } else if coordinator.state() == CoordinatorState::Recovery {
        warn!("sealed state present but unrecoverable with the current seal key; awaiting operator recovery");
    }

    let engine = service_engine::Engine::new();
    engine.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    engine.stop().await?;
    coordinator.stop()?;
    info!("coordinatord stopped cleanly");

    Ok(())
}
