//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Stop admitting on request, distinguishing that from accept failures

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::ListenerConfig;
use crate::net::transport::Connection;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// Admission was stopped; the listener is done.
    #[error("Listener closed")]
    Closed,
}

/// One occupied admission slot.
///
/// The slot goes back to the pool on the first [`release`](Self::release)
/// or on drop, whichever comes first.
#[derive(Debug)]
pub struct AdmissionToken {
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    released: AtomicBool,
}

impl AdmissionToken {
    /// `None` for an unbounded listener.
    pub fn new(permit: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            permit: Mutex::new(permit),
            released: AtomicBool::new(false),
        }
    }

    /// Give the slot back. Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        let permit = self
            .permit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(permit);
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Cloneable trigger for [`Listener::stop_admitting`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: CancellationToken,
}

impl StopHandle {
    /// Idempotent.
    pub fn stop_admitting(&self) {
        self.stopped.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections wait in the kernel backlog until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections; `None` when unbounded.
    connection_limit: Option<Arc<Semaphore>>,
    /// Configured maximum connections (0 = unbounded).
    max_connections: usize,
    /// Fired by `stop_admitting`.
    stopped: CancellationToken,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: config.bind_address.clone(),
                source,
            })?;

        Ok(Self::from_tcp(listener, config.max_connections))
    }

    /// Wrap an already-bound listener.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Self {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                max_connections,
                "Listener bound"
            );
        }

        Self {
            inner: listener,
            connection_limit: (max_connections > 0)
                .then(|| Arc::new(Semaphore::new(max_connections))),
            max_connections,
            stopped: CancellationToken::new(),
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Waits if the limit has been reached. The returned connection holds
    /// its admission slot until closed or dropped. Returns
    /// [`ListenerError::Closed`] once admission has been stopped, including
    /// when the stop fires while this call is waiting.
    pub async fn accept(&self) -> Result<(Connection<TcpStream>, SocketAddr), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = match &self.connection_limit {
            Some(limit) => tokio::select! {
                biased;
                _ = self.stopped.cancelled() => return Err(ListenerError::Closed),
                permit = limit.clone().acquire_owned() => {
                    Some(permit.map_err(|_| ListenerError::Closed)?)
                }
            },
            None => None,
        };

        // Then accept the connection; an early return drops the permit.
        let (stream, addr) = tokio::select! {
            biased;
            _ = self.stopped.cancelled() => return Err(ListenerError::Closed),
            accepted = self.inner.accept() => accepted.map_err(ListenerError::Accept)?,
        };

        tracing::debug!(
            peer_addr = %addr,
            available_permits = ?self.available_permits(),
            "Connection accepted"
        );

        let token = Arc::new(AdmissionToken::new(permit));
        Ok((Connection::admitted(stream, token), addr))
    }

    /// Stop admitting. Pending and future `accept` calls return
    /// [`ListenerError::Closed`]; the socket closes when the listener drops.
    pub fn stop_admitting(&self) {
        self.stopped.cancel();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stopped: self.stopped.clone(),
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots (`None` when unbounded).
    pub fn available_permits(&self) -> Option<usize> {
        self.connection_limit
            .as_ref()
            .map(|limit| limit.available_permits())
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}
