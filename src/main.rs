//! Failover Load Balancer
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ http server ──▶ pool (least conn / rr)     │
//!                          │        │                 │                   │
//!                          │        ▼                 ▼                   │
//!                          │   dispatcher ──▶ backend ──▶ upstream ───────┼──▶ Backend
//!                          │        │ error                               │
//!                          │        ▼                                     │
//!                          │   failover: mark dead, retry once            │
//!                          │                                              │
//!                          │   health monitor: TCP probe every interval   │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use failover_lb::config::load_config;
use failover_lb::lifecycle::{startup, Shutdown};
use failover_lb::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "failover-lb")]
#[command(about = "HTTP load balancer with health checks and failover", long_about = None)]
struct Cli {
    /// Configuration file (.json, otherwise TOML)
    #[arg(default_value = "config.json")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"));
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_logging(
        cli.log_level
            .as_deref()
            .unwrap_or(&config.observability.log_level),
    );

    tracing::info!(
        path = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        policy = ?config.policy,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
