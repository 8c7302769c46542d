//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream dial:
//!     → timeouts.rs (bounded connect, abandoned on shutdown)
//!
//! Accept failure:
//!     → backoff.rs (pause before the next accept)
//! ```
//!
//! # Design Decisions
//! - Every upstream dial has a deadline
//! - No dial retries: one inbound connection gets exactly one attempt

pub mod backoff;
pub mod timeouts;
