//! Per-connection relay session.
//!
//! A session owns one admitted client connection and the upstream
//! connection dialed for it, and runs the two copy directions to completion.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::net::{Connection, SessionId, SessionState, Transport};
use crate::observability::metrics;
use crate::relay::copy::{CopyOutcome, Direction, Pump};
use crate::resilience::timeouts::{self, DialError};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Upstream was reached and both directions ran to completion.
    Relayed,
    /// The upstream dial failed; no bytes were relayed.
    DialFailed,
}

/// Final accounting for one session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub outcome: SessionOutcome,
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
    pub duration: Duration,
}

/// One client ↔ upstream relay.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer_addr: SocketAddr,
    started: Instant,
    state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            started: Instant::now(),
            state: SessionState::Admitted,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(session_id = %self.id, from = %self.state, to = %next, "Session state");
        self.state = next;
    }

    /// Relay `client` to the configured upstream until both directions end.
    ///
    /// `shutdown` only aborts a dial still in progress; once relaying, the
    /// session ends through EOF, I/O errors or the idle deadline.
    pub async fn run<T: Transport>(
        mut self,
        client: Connection<T>,
        config: Arc<RelayConfig>,
        shutdown: CancellationToken,
    ) -> SessionSummary {
        metrics::record_session_opened();
        tracing::info!(session_id = %self.id, peer_addr = %self.peer_addr, "Session admitted");

        if let Err(err) = client.configure_keepalive(config.keepalive()) {
            tracing::debug!(session_id = %self.id, error = %err, "Client keepalive not applied");
        }

        self.advance(SessionState::Dialing);
        let upstream = match timeouts::dial(
            &config.upstream.address,
            config.dial_timeout(),
            &shutdown,
        )
        .await
        {
            Ok(stream) => stream,
            Err(err) => return self.dial_failed(client, &config, err),
        };

        let upstream = Connection::new(upstream);
        if let Err(err) = upstream.configure_keepalive(config.keepalive()) {
            tracing::debug!(session_id = %self.id, error = %err, "Upstream keepalive not applied");
        }

        // Fixed absolute deadline, not refreshed by traffic.
        let deadline = config.idle_timeout().map(|idle| Instant::now() + idle);

        tracing::info!(
            session_id = %self.id,
            upstream = %config.upstream.address,
            "Upstream connected"
        );

        self.advance(SessionState::Relaying);
        let (client_to_upstream, upstream_to_client) =
            self.relay(client, upstream, deadline).await;

        self.finish(
            SessionOutcome::Relayed,
            client_to_upstream,
            upstream_to_client,
        )
    }

    async fn relay<T: Transport>(
        &mut self,
        client: Connection<T>,
        upstream: Connection<TcpStream>,
        deadline: Option<Instant>,
    ) -> (u64, u64) {
        let (client_read, client_write, client_handle) = client.into_split();
        let (upstream_read, upstream_write, upstream_handle) = upstream.into_split();

        let mut pumps = JoinSet::new();
        pumps.spawn(
            Pump {
                direction: Direction::ClientToUpstream,
                src: client_read,
                src_handle: client_handle.clone(),
                dst: upstream_write,
                dst_handle: upstream_handle.clone(),
                deadline,
            }
            .run(self.id),
        );
        pumps.spawn(
            Pump {
                direction: Direction::UpstreamToClient,
                src: upstream_read,
                src_handle: upstream_handle.clone(),
                dst: client_write,
                dst_handle: client_handle.clone(),
                deadline,
            }
            .run(self.id),
        );

        let mut client_to_upstream = 0;
        let mut upstream_to_client = 0;
        while let Some(joined) = pumps.join_next().await {
            match joined {
                Ok(CopyOutcome {
                    direction, bytes, ..
                }) => match direction {
                    Direction::ClientToUpstream => client_to_upstream = bytes,
                    Direction::UpstreamToClient => upstream_to_client = bytes,
                },
                Err(err) => {
                    tracing::error!(session_id = %self.id, error = %err, "Copy task failed");
                }
            }
            if self.state == SessionState::Relaying {
                self.advance(SessionState::Draining);
            }
        }

        // Both halves of each stream were owned by the finished tasks, so the
        // sockets are already dropped; this releases the admission slot.
        upstream_handle.close();
        client_handle.close();

        (client_to_upstream, upstream_to_client)
    }

    fn dial_failed<T: Transport>(
        self,
        client: Connection<T>,
        config: &RelayConfig,
        err: DialError,
    ) -> SessionSummary {
        metrics::record_dial_failure();
        tracing::warn!(
            session_id = %self.id,
            upstream = %config.upstream.address,
            error = %err,
            "Dial upstream failed"
        );
        client.close();
        self.finish(SessionOutcome::DialFailed, 0, 0)
    }

    fn finish(
        mut self,
        outcome: SessionOutcome,
        client_to_upstream: u64,
        upstream_to_client: u64,
    ) -> SessionSummary {
        self.advance(SessionState::Closed);
        let duration = self.started.elapsed();
        metrics::record_session_closed(duration);

        tracing::info!(
            session_id = %self.id,
            peer_addr = %self.peer_addr,
            bytes_in = client_to_upstream,
            bytes_out = upstream_to_client,
            duration_ms = duration.as_millis() as u64,
            "Session closed"
        );

        SessionSummary {
            id: self.id,
            outcome,
            client_to_upstream,
            upstream_to_client,
            duration,
        }
    }
}
