//! One direction of a relay.
//!
//! Bytes are read from one connection and written to the other until EOF,
//! an I/O error, the idle deadline, or the source/destination being closed.
//! The destination is then half-closed when it supports it, otherwise closed
//! outright.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep_until, timeout, Instant};

use crate::net::{CloseHandle, SessionId};
use crate::observability::metrics;
use crate::relay::error::RelayError;

/// Per-direction copy buffer.
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Upper bound on a write-side shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Which way bytes are flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client->upstream",
            Direction::UpstreamToClient => "upstream->client",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one finished direction.
#[derive(Debug)]
pub struct CopyOutcome {
    pub direction: Direction,
    pub bytes: u64,
    pub error: Option<RelayError>,
}

/// Both ends of one direction.
pub struct Pump<R, W> {
    pub direction: Direction,
    pub src: R,
    pub src_handle: CloseHandle,
    pub dst: W,
    pub dst_handle: CloseHandle,
    /// Absolute deadline shared by every operation of the session.
    pub deadline: Option<Instant>,
}

impl<R, W> Pump<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Copy to completion, log the outcome, then finish the destination.
    pub async fn run(mut self, session_id: SessionId) -> CopyOutcome {
        let (bytes, result) = copy_one_way(
            &mut self.src,
            &self.src_handle,
            &mut self.dst,
            &self.dst_handle,
            self.deadline,
        )
        .await;

        metrics::record_bytes(self.direction.as_str(), bytes);
        if let Err(err) = &result {
            log_copy_error(session_id, self.direction, bytes, err);
        }

        self.finish_destination().await;

        CopyOutcome {
            direction: self.direction,
            bytes,
            error: result.err(),
        }
    }

    async fn finish_destination(&mut self) {
        if self.dst_handle.capabilities().half_close && !self.dst_handle.is_closed() {
            match timeout(SHUTDOWN_GRACE, self.dst.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::trace!(direction = %self.direction, error = %err, "Half-close failed");
                }
                Err(_) => {
                    tracing::trace!(direction = %self.direction, "Half-close timed out");
                }
            }
        } else {
            self.dst_handle.close();
        }
    }
}

fn log_copy_error(session_id: SessionId, direction: Direction, bytes: u64, err: &RelayError) {
    if err.is_closed() {
        tracing::debug!(%session_id, %direction, bytes, "Copy stopped: connection closed");
        return;
    }

    metrics::record_copy_error(direction.as_str());
    if err.is_timeout() {
        tracing::info!(%session_id, %direction, bytes, "Copy stopped: idle deadline reached");
    } else {
        tracing::warn!(%session_id, %direction, bytes, error = %err, "Copy error");
    }
}

/// Copy `src` into `dst` until EOF or failure.
///
/// Returns the number of bytes written to `dst` alongside the outcome; the
/// count is meaningful on error too.
pub async fn copy_one_way<R, W>(
    src: &mut R,
    src_handle: &CloseHandle,
    dst: &mut W,
    dst_handle: &CloseHandle,
    deadline: Option<Instant>,
) -> (u64, Result<(), RelayError>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut transferred = 0u64;

    loop {
        let n = match guarded(src.read(&mut buf), src_handle, deadline).await {
            Ok(0) => return (transferred, Ok(())),
            Ok(n) => n,
            Err(err) => return (transferred, Err(err)),
        };

        if let Err(err) = guarded(dst.write_all(&buf[..n]), dst_handle, deadline).await {
            return (transferred, Err(err));
        }
        transferred += n as u64;
    }
}

/// Run one I/O operation, failing early if the connection is closed or the
/// deadline passes.
async fn guarded<F, T>(
    op: F,
    handle: &CloseHandle,
    deadline: Option<Instant>,
) -> Result<T, RelayError>
where
    F: Future<Output = std::io::Result<T>>,
{
    let expiry = async {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = handle.closed() => Err(RelayError::Closed),
        _ = expiry => Err(RelayError::IdleTimeout),
        res = op => res.map_err(RelayError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Capabilities, Connection, Transport};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, DuplexStream, ReadBuf};

    /// Duplex pipe that reports no optional capabilities.
    struct Plain(DuplexStream);

    impl AsyncRead for Plain {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Plain {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_shutdown(cx)
        }
    }

    impl Transport for Plain {}

    #[tokio::test]
    async fn copies_until_eof_and_half_closes() {
        let (mut client, relay_side) = duplex(1024);
        let (relay_upstream, mut upstream) = duplex(1024);

        let src = Connection::new(relay_side);
        let dst = Connection::new(relay_upstream);
        let (src_read, _src_write, src_handle) = src.into_split();
        let (_dst_read, dst_write, dst_handle) = dst.into_split();

        let pump = Pump {
            direction: Direction::ClientToUpstream,
            src: src_read,
            src_handle,
            dst: dst_write,
            dst_handle: dst_handle.clone(),
            deadline: None,
        };
        let task = tokio::spawn(pump.run(SessionId::new()));

        client.write_all(b"hello upstream").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        upstream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello upstream");

        let outcome = task.await.unwrap();
        assert_eq!(outcome.bytes, 14);
        assert!(outcome.error.is_none());
        // half-closed only, not fully closed
        assert!(!dst_handle.is_closed());
    }

    #[tokio::test]
    async fn moves_payload_larger_than_buffer() {
        let payload: Vec<u8> = (0..COPY_BUFFER_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let (mut client, relay_side) = duplex(4096);
        let (relay_upstream, mut upstream) = duplex(4096);

        let (mut src, _, src_handle) = Connection::new(relay_side).into_split();
        let (_, mut dst, dst_handle) = Connection::new(relay_upstream).into_split();

        let copy = tokio::spawn(async move {
            copy_one_way(&mut src, &src_handle, &mut dst, &dst_handle, None).await
        });
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client.shutdown().await.unwrap();
        });

        let mut received = Vec::new();
        let (bytes, result) = {
            let reader = upstream.read_to_end(&mut received);
            let (read, copied) = tokio::join!(reader, copy);
            read.unwrap();
            copied.unwrap()
        };
        writer.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(bytes, expected.len() as u64);
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn deadline_stops_idle_copy() {
        let (_client, relay_side) = duplex(64);
        let (relay_upstream, _upstream) = duplex(64);
        let (mut src, _, src_handle) = Connection::new(relay_side).into_split();
        let (_, mut dst, dst_handle) = Connection::new(relay_upstream).into_split();

        let started = Instant::now();
        let deadline = Some(started + Duration::from_millis(100));
        let (bytes, result) =
            copy_one_way(&mut src, &src_handle, &mut dst, &dst_handle, deadline).await;

        assert_eq!(bytes, 0);
        assert!(matches!(result, Err(RelayError::IdleTimeout)));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn closing_source_unblocks_read() {
        let (_client, relay_side) = duplex(64);
        let (relay_upstream, _upstream) = duplex(64);
        let (mut src, _, src_handle) = Connection::new(relay_side).into_split();
        let (_, mut dst, dst_handle) = Connection::new(relay_upstream).into_split();

        let closer = src_handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        });

        let (_, result) = timeout(
            Duration::from_secs(1),
            copy_one_way(&mut src, &src_handle, &mut dst, &dst_handle, None),
        )
        .await
        .unwrap();
        let err = result.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn destination_without_half_close_is_fully_closed() {
        let (mut client, relay_side) = duplex(64);
        let (relay_upstream, _upstream) = duplex(64);

        let src = Connection::new(relay_side);
        let dst = Connection::new(Plain(relay_upstream));
        assert_eq!(dst.capabilities(), Capabilities::NONE);

        let (src_read, _src_write, src_handle) = src.into_split();
        let (_dst_read, dst_write, dst_handle) = dst.into_split();

        client.shutdown().await.unwrap();
        let outcome = Pump {
            direction: Direction::ClientToUpstream,
            src: src_read,
            src_handle,
            dst: dst_write,
            dst_handle: dst_handle.clone(),
            deadline: None,
        }
        .run(SessionId::new())
        .await;

        assert_eq!(outcome.bytes, 0);
        assert!(outcome.error.is_none());
        assert!(dst_handle.is_closed());
    }
}
