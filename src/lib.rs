//! Transparent TCP relay to a fixed upstream.
//!
//! Each accepted client connection is paired with one freshly dialed upstream
//! connection and bytes are copied both ways, unmodified, with half-close
//! support, an optional idle deadline and a bounded number of concurrent
//! connections. Shutdown stops admission and drains running sessions.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod server;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use server::Server;
