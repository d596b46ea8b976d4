//! Activation guard
//!
//! A filter chain in front of the activation API.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                  ACTIVATION GUARD                    │
//!   Client Request   │  ┌────────────┐   ┌──────────────────────────────┐   │
//!   ─────────────────┼─▶│ request id │──▶│         filter chain         │   │
//!                    │  │  timeout   │   │ logging → headers → xss →    │   │
//!                    │  └────────────┘   │ sqli → ddos → rate limit →   │   │
//!                    │                   │ host → monitoring → cors     │   │
//!                    │                   └──────────────┬───────────────┘   │
//!                    │                                  ▼                   │
//!   Client Response  │                   ┌──────────────────────────────┐   │
//!   ◀────────────────┼───────────────────│ built-in handler / upstream  │◀──┼── Activation API
//!                    │                   └──────────────────────────────┘   │
//!                    │  ┌────────────────────────────────────────────────┐  │
//!                    │  │ counters · suspicion scores · whitelist        │  │
//!                    │  │ admin API · metrics · config · lifecycle       │  │
//!                    │  └────────────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use activation_guard::config::{load_config, GuardConfig};
use activation_guard::lifecycle::{wait_for_signal, Shutdown};
use activation_guard::observability::{logging, metrics};
use activation_guard::HttpServer;

#[derive(Parser)]
#[command(name = "activation-guard", version, about = "Request filter chain for the activation API")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "activation-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        config_file = ?args.config,
        request_timeout_secs = config.timeouts.request_secs,
        upstream = ?config.upstream.address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config.clone())?;
    let shutdown = Shutdown::new();

    if config.admin.enabled {
        let admin = server.admin_router();
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let stop = shutdown.signalled();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, admin).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
