//! The admission loop.
//!
//! # Responsibilities
//! - Pull admitted connections from the bounded listener
//! - Spawn one session task per connection, tracked for drain
//! - Back off on transient accept errors
//! - On shutdown: stop admitting, close the endpoint, wait for sessions

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::lifecycle::{Shutdown, ShutdownCoordinator};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::relay::Session;
use crate::resilience::backoff::accept_backoff;

/// TCP relay server.
pub struct Server {
    listener: Listener,
    config: Arc<RelayConfig>,
    tracker: ConnectionTracker,
}

impl Server {
    /// Bind the configured listen address. Failure here is fatal.
    pub async fn bind(config: RelayConfig) -> Result<Self, ListenerError> {
        let listener = Listener::bind(&config.listener).await?;
        Ok(Self::new(listener, config))
    }

    /// Build a server around an already-bound listener.
    pub fn new(listener: Listener, config: RelayConfig) -> Self {
        Self {
            listener,
            config: Arc::new(config),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Handle for observing live sessions.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Admit and relay connections until `shutdown` fires, then wait for
    /// every in-flight session to close.
    pub async fn run(self, shutdown: Shutdown) {
        let Self {
            listener,
            config,
            tracker,
        } = self;

        let coordinator =
            ShutdownCoordinator::new(shutdown.clone(), listener.stop_handle(), tracker.clone());
        let watcher = coordinator.watch();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                upstream = %config.upstream.address,
                "Relay accepting connections"
            );
        }

        let mut consecutive_errors = 0u32;
        loop {
            match listener.accept().await {
                Ok((client, peer_addr)) => {
                    consecutive_errors = 0;
                    let guard = tracker.track();
                    let session = Session::new(guard.id(), peer_addr);
                    let config = Arc::clone(&config);
                    let cancel = shutdown.subscribe();
                    tokio::spawn(async move {
                        let _guard = guard;
                        session.run(client, config, cancel).await;
                    });
                }
                Err(ListenerError::Closed) => break,
                Err(err) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    metrics::record_accept_error();
                    tracing::warn!(error = %err, consecutive_errors, "Accept error");
                    tokio::time::sleep(accept_backoff(consecutive_errors)).await;
                }
            }
        }

        // Close the endpoint before draining so new clients are refused
        // instead of queueing in the backlog.
        drop(listener);
        watcher.abort();

        coordinator.drain().await;
        tracing::info!("Relay shutdown complete");
    }
}
