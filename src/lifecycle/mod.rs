//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Signal observed → Stop admitting → Drain sessions → Done
//! ```
//!
//! # Design Decisions
//! - Only admission observes the signal; running relays are never cut short
//! - No built-in drain deadline; callers wanting one wrap the server future

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownCoordinator};
