//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (admission slot, accept)
//!     → transport.rs (capabilities, close guard)
//!     → connection.rs (session id, lifecycle tracking)
//!     → Hand off to the relay
//! ```
//!
//! # Design Decisions
//! - Bounded admission blocks instead of rejecting
//! - Each session tracked for graceful shutdown
//! - Capabilities decided once per connection

pub mod connection;
pub mod listener;
pub mod transport;

pub use connection::{ConnectionTracker, SessionId, SessionState};
pub use listener::{AdmissionToken, Listener, ListenerError, StopHandle};
pub use transport::{Capabilities, CloseHandle, Connection, Transport};
