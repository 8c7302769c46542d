//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted client connection
//!     → session.rs (keepalive, bounded upstream dial, idle deadline)
//!     → copy.rs ×2 (client→upstream, upstream→client)
//!     → half-close or close of each destination
//!     → join, close both, release admission slot
//! ```
//!
//! # Design Decisions
//! - Bytes are forwarded unmodified; no framing or inspection
//! - Idle timeout is one absolute deadline per session, not refreshed by traffic
//! - Copy errors stay inside the session; closed-connection races are not alarms

pub mod copy;
pub mod error;
pub mod session;

pub use copy::{Direction, COPY_BUFFER_SIZE};
pub use error::RelayError;
pub use session::{Session, SessionOutcome, SessionSummary};
