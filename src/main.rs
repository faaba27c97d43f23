//! WebID profile server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ listener ──▶ layers (request id, trace, timeout, limit)
//!                                      │
//!                    ┌─────────────────┼──────────────────┐
//!                    ▼                 ▼                  ▼
//!                 GET /          /profile (CORS)       /health
//!                    │          GET │  PUT/DELETE
//!                    │              │  require_auth (bearer | pki)
//!                    ▼              ▼
//!                ┌──────────────────────────┐
//!                │       ProfileStore       │──▶ profile.json (optional)
//!                └──────────────────────────┘
//!
//!     config file ──▶ ConfigWatcher ──▶ auth settings swap
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use webid_server::config::{load_config, watcher::ConfigWatcher, ServerConfig};
use webid_server::http::HttpServer;
use webid_server::lifecycle::{wait_for_signal, Shutdown};
use webid_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "webid-server", version, about = "Serves and stores a WebID profile document")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "WEBID_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long, env = "WEBID_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webid-server starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        auth_mode = ?config.auth.mode,
        storage_path = ?config.profile.storage_path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server for reloads to arrive.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(config).await?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
