//! Queue Admission Engine - Main Entry Point

mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use admit_core::application::{shutdown_channel, AdmissionService, CycleOutcome, PriorityOrderer};
use admit_core::port::{SystemTimeProvider, UuidProvider};
use admit_infra_memory::{
    load_seed, InMemoryControlPlane, InMemoryWorkloads, StaticPriorityClassResolver,
    TracingPlacementSink,
};

use crate::config::DaemonConfig;
use crate::telemetry::init_logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "queue-admission-engine")]
#[command(about = "Priority-aware queue admission engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "ADMIT_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single admission cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let cfg = DaemonConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // 2. Initialize logging
    let _log_guard = init_logging(&cfg)?;
    info!("Queue Admission Engine v{} starting...", VERSION);

    // 3. Control plane (seeded if configured)
    let control_plane = match cfg.seed_path() {
        Some(path) => {
            let seed = load_seed(&path)
                .await
                .with_context(|| format!("Failed to load seed {}", path.display()))?;
            InMemoryControlPlane::from_seed(seed)
        }
        None => {
            warn!("No seed_path configured, starting with an empty control plane");
            InMemoryControlPlane::new()
        }
    };

    // 4. Setup dependencies (DI wiring)
    let resolver = Arc::new(StaticPriorityClassResolver::new(cfg.priority_classes.clone()));
    let service = Arc::new(
        AdmissionService::new(
            Arc::new(control_plane),
            Arc::new(InMemoryWorkloads::new()),
            Arc::new(TracingPlacementSink),
            PriorityOrderer::new(resolver),
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
            cfg.admission.clone(),
        )
        .with_interval(cfg.cycle_interval()),
    );

    if cli.once {
        match service.run_cycle(None).await? {
            CycleOutcome::Completed(report) => info!(
                admitted = report.admitted(),
                updates = report.unit_updates.len(),
                faults = report.faults.len(),
                "Single cycle finished"
            ),
            CycleOutcome::Skipped => warn!("Single cycle skipped"),
        }
        return Ok(());
    }

    // 5. Start admission loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let loop_handle = tokio::spawn({
        let service = service.clone();
        async move {
            if let Err(e) = service.run(shutdown_rx).await {
                error!(error = ?e, "Admission service failed");
            }
        }
    });

    info!(interval_ms = cfg.cycle_interval_ms, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, loop_handle)
        .await
        .is_err()
    {
        warn!("Admission loop did not stop within the grace period");
    }

    info!("Shutdown complete.");
    Ok(())
}
