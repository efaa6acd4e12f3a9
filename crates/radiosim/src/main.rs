//! # radiosim
//!
//! RadioSim relay binary. Parses the listen address, starts the server
//! and stops it cleanly on Ctrl-C.

#![deny(unsafe_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use radiosim_core::logging;
use radiosim_server::config::parse_port;
use radiosim_server::{RadioServer, ServerConfig};

/// Frequency-grouped TCP relay for simulator radio traffic.
#[derive(Parser, Debug)]
#[command(name = "radiosim", about = "Frequency-grouped TCP relay")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (must be an integer in 1-65535).
    #[arg(long, default_value = "15100", allow_hyphen_values = true)]
    port: String,

    /// Log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = logging::DEFAULT_LEVEL)]
    log_level: String,

    /// Serve Prometheus metrics on this port (disabled when omitted).
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_subscriber(&cli.log_level);

    if let Some(port) = cli.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        radiosim_server::metrics::install_exporter(addr)
            .context("failed to install metrics exporter")?;
    }

    let port = parse_port(&cli.port).context("invalid --port")?;
    let server = RadioServer::new(ServerConfig::from_env());
    tracing::debug!(config = ?server.config(), "server configuration");
    let addr = server
        .start(&cli.host, i64::from(port))
        .await
        .context("failed to start radio server")?;
    tracing::info!(%addr, "radiosim ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    server.stop().await;
    Ok(())
}
