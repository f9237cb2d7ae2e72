//! socks-gate: a connection-limited SOCKS5 proxy.
//!
//! Accepts loopback SOCKS5 clients, performs the no-auth CONNECT
//! handshake, dials the requested destination, and relays bytes both
//! ways while capping concurrently open client connections.

use std::path::PathBuf;

use clap::Parser;

use socks_gate::config::{self, ProxyConfig};
use socks_gate::lifecycle::signals;
use socks_gate::net::listener::SocksListener;
use socks_gate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "socks-gate")]
#[command(about = "Connection-limited SOCKS5 proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port (keeps the configured host).
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the connection cap; zero or negative means unlimited.
    #[arg(short, long)]
    max_connections: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging("socks_gate=debug");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }
    if let Some(max_connections) = cli.max_connections {
        config.listener.max_connections = max_connections;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = SocksListener::new(config);
    let local_addr = listener.start().await?;
    tracing::info!(address = %local_addr, "accepting SOCKS5 connections");

    signals::shutdown_signal().await;
    tracing::info!("shutdown signal received");

    listener.stop();
    tracing::info!("shutdown complete");
    Ok(())
}
