//! Copy error classification.

use std::io;

use thiserror::Error;

/// Why one direction of a relay stopped before EOF.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Io(#[from] io::Error),

    /// The session's idle deadline passed.
    #[error("idle deadline reached")]
    IdleTimeout,

    /// The connection was closed underneath the copy.
    #[error("connection closed")]
    Closed,
}

impl RelayError {
    /// Expected teardown races rather than genuine I/O faults.
    pub fn is_closed(&self) -> bool {
        match self {
            RelayError::Closed => true,
            RelayError::Io(err) => matches!(err.kind(), io::ErrorKind::NotConnected),
            RelayError::IdleTimeout => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::IdleTimeout)
    }
}
