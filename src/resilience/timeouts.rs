//! Timeout enforcement for upstream dials.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A dial can be abandoned early through a cancellation token

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Why an upstream dial failed.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("dial abandoned: shutdown in progress")]
    Cancelled,
}

/// Connect to `addr` (`host:port`), giving up after `limit`.
pub async fn connect_with_timeout(addr: &str, limit: Duration) -> Result<TcpStream, DialError> {
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(stream) => Ok(stream?),
        Err(_) => Err(DialError::Timeout(limit)),
    }
}

/// Like [`connect_with_timeout`], but also gives up when `cancel` fires.
pub async fn dial(
    addr: &str,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<TcpStream, DialError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DialError::Cancelled),
        res = connect_with_timeout(addr, limit) => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let stream = connect_with_timeout(&addr, Duration::from_secs(1)).await;
        assert!(stream.is_ok());
    }

    #[tokio::test]
    async fn refused_is_io_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let result = connect_with_timeout(&addr, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DialError::Io(_))));
    }

    #[tokio::test]
    async fn cancelled_dial_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = dial("10.255.255.1:22", Duration::from_secs(5), &cancel).await;
        assert!(matches!(result, Err(DialError::Cancelled)));
    }
}
