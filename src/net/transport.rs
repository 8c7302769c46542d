//! Transport capabilities and the per-connection close guard.
//!
//! Whether a stream can be half-closed or can carry a keepalive period is
//! decided once, when a [`Connection`] is built, instead of being probed at
//! the point of use.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::net::listener::AdmissionToken;

/// Optional operations a transport supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Write side can be shut down while reads continue.
    pub half_close: bool,
    /// Keepalive probing period can be configured.
    pub keepalive: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        half_close: false,
        keepalive: false,
    };
}

/// A byte stream the relay can carry.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Enable keepalive probes with the given period.
    fn set_keepalive(&self, _period: Duration) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "transport does not support keepalive",
        ))
    }
}

impl Transport for TcpStream {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            half_close: true,
            keepalive: true,
        }
    }

    fn set_keepalive(&self, period: Duration) -> io::Result<()> {
        let keepalive = TcpKeepalive::new().with_time(period);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "windows"
        ))]
        let keepalive = keepalive.with_interval(period);
        SockRef::from(self).set_tcp_keepalive(&keepalive)
    }
}

/// In-memory pipe; shutting down the write side delivers EOF to the peer
/// while reads keep working.
impl Transport for DuplexStream {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            half_close: true,
            keepalive: false,
        }
    }
}

/// Shared close guard for one connection.
///
/// Closing fires the connection's closed signal (unblocking anything
/// waiting on it) and releases the admission token, both at most once.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    inner: Arc<CloseState>,
}

#[derive(Debug)]
struct CloseState {
    capabilities: Capabilities,
    closed: CancellationToken,
    fired: AtomicBool,
    token: Option<Arc<AdmissionToken>>,
}

impl CloseHandle {
    fn new(capabilities: Capabilities, token: Option<Arc<AdmissionToken>>) -> Self {
        Self {
            inner: Arc::new(CloseState {
                capabilities,
                closed: CancellationToken::new(),
                fired: AtomicBool::new(false),
                token,
            }),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    /// Close the connection. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.closed.cancel();
        if let Some(token) = &self.inner.token {
            token.release();
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.inner.closed.cancelled()
    }
}

/// A transport together with its capability set and close guard.
#[derive(Debug)]
pub struct Connection<T> {
    io: T,
    handle: CloseHandle,
}

impl<T: Transport> Connection<T> {
    /// Wrap a stream that holds no admission slot (e.g. an upstream dial).
    pub fn new(io: T) -> Self {
        Self::build(io, None)
    }

    /// Wrap an admitted stream; closing it releases `token`.
    pub fn admitted(io: T, token: Arc<AdmissionToken>) -> Self {
        Self::build(io, Some(token))
    }

    fn build(io: T, token: Option<Arc<AdmissionToken>>) -> Self {
        let capabilities = io.capabilities();
        Self {
            io,
            handle: CloseHandle::new(capabilities, token),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.handle.capabilities()
    }

    pub fn handle(&self) -> CloseHandle {
        self.handle.clone()
    }

    pub fn get_ref(&self) -> &T {
        &self.io
    }

    /// Apply the keepalive policy.
    ///
    /// Returns `Ok(false)` when keepalive is disabled or unsupported.
    pub fn configure_keepalive(&self, period: Option<Duration>) -> io::Result<bool> {
        match period {
            Some(period) if self.capabilities().keepalive => {
                self.io.set_keepalive(period)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Split into independently owned halves plus the shared close guard.
    pub fn into_split(self) -> (ReadHalf<T>, WriteHalf<T>, CloseHandle) {
        let (reader, writer) = tokio::io::split(self.io);
        (reader, writer, self.handle)
    }

    /// Drop the stream and release its slot. Idempotent with other closes
    /// through the same guard.
    pub fn close(self) -> bool {
        let Self { io, handle } = self;
        drop(io);
        handle.close()
    }
}
