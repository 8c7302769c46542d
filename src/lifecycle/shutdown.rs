//! Shutdown coordination for the relay.
//!
//! Shutdown is a drain: admission stops, running sessions finish on their
//! own, and only then is the process considered quiesced.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::net::{ConnectionTracker, StopHandle};

/// Process-wide shutdown signal.
///
/// Cloning shares the same signal; triggering is idempotent.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observers can wait on.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

/// Ties the shutdown signal to admission and waits for sessions to drain.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    shutdown: Shutdown,
    stop: StopHandle,
    tracker: ConnectionTracker,
}

impl ShutdownCoordinator {
    pub fn new(shutdown: Shutdown, stop: StopHandle, tracker: ConnectionTracker) -> Self {
        Self {
            shutdown,
            stop,
            tracker,
        }
    }

    /// Stop admission as soon as the signal fires.
    pub fn watch(&self) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        let stop = self.stop.clone();
        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            shutdown.triggered().await;
            if !stop.is_stopped() {
                tracing::info!(
                    active_sessions = tracker.active_count(),
                    "Shutdown signal received, no longer admitting connections"
                );
            }
            stop.stop_admitting();
        })
    }

    /// Wait until every session spawned so far has closed.
    pub async fn drain(&self) {
        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active_sessions = active, "Waiting for sessions to drain");
        }
        self.tracker.wait_for_drain().await;
    }
}
