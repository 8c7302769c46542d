//! ssh-forward
//!
//! Relays TCP connections from a local listener to a fixed upstream, e.g.
//! to reach `github.com:22` through a network that only allows other ports.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                   ssh-forward                    │
//!                 │                                                  │
//!   Client ───────┼─▶ net::listener ──▶ relay::session ─────────────┼──▶ Upstream
//!                 │   (admission slot)   (dial, keepalive, deadline) │
//!          ◀──────┼─────────────────── relay::copy ×2 ◀─────────────┼───
//!                 │                                                  │
//!                 │   lifecycle: signals → shutdown → drain          │
//!                 │   config · observability · resilience            │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use clap::Parser;

use ssh_forward::config::duration::format_duration;
use ssh_forward::config::Args;
use ssh_forward::lifecycle::{signals, Shutdown};
use ssh_forward::observability::{logging, metrics};
use ssh_forward::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config()?;

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listener.bind_address,
        upstream = %config.upstream.address,
        dial_timeout = %format_duration(config.timeouts.dial),
        idle_timeout = %format_duration(config.timeouts.idle),
        keepalive_secs = config.tcp.keepalive_secs,
        max_connections = config.listener.max_connections,
        "ssh-forward starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "Listen failed");
            return Err(err.into());
        }
    };

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());

    server.run(shutdown).await;
    Ok(())
}
