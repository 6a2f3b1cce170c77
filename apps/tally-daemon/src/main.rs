//! # Tally Daemon
//!
//! Keeps the remote record store in line with per-vendor invoice totals.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Daemon                                   │
//! │                                                                         │
//! │  startup:  .env ──► tracing ──► SyncConfig ──► SyncLoop                │
//! │  running:  one cycle per interval (first cycle immediately)            │
//! │  stopping: SIGINT / SIGTERM ──► finish current cycle ──► exit 0        │
//! │  failure:  configuration error ──► exit non-zero, no cycle started     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tally_sync::{SyncConfig, SyncLoop};

const DEFAULT_LOG_FILTER: &str = "info,tally=debug,sqlx=warn";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production.
    let dotenv = dotenvy::dotenv();

    init_tracing();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Tally sync daemon...");

    let config = match SyncConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration error; refusing to start");
            return Err(e).context("failed to load configuration");
        }
    };

    let (sync_loop, handle) = SyncLoop::from_config(&config).context("failed to build sync loop")?;

    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = handle.shutdown().await {
            warn!(error = %e, "Shutdown request not delivered");
        }
    });

    let cycles = sync_loop.run().await;

    info!(cycles, "Daemon shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, finishing current cycle...");
}
