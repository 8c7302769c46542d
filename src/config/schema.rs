//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, admission limit).
    pub listener: ListenerConfig,

    /// The single upstream every connection is relayed to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Socket options applied to both sides of a session.
    pub tcp: TcpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Upstream dial timeout.
    pub fn dial_timeout(&self) -> Duration {
        self.timeouts.dial
    }

    /// Idle timeout, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        Some(self.timeouts.idle).filter(|d| !d.is_zero())
    }

    /// Keepalive period, `None` when disabled.
    pub fn keepalive(&self) -> Option<Duration> {
        (self.tcp.keepalive_secs > 0).then(|| Duration::from_secs(self.tcp.keepalive_secs))
    }

    /// Admission limit, `None` when unbounded.
    pub fn max_connections(&self) -> Option<usize> {
        (self.listener.max_connections > 0).then_some(self.listener.max_connections)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7022").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure). 0 = unbounded.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7022".to_string(),
            max_connections: 0,
        }
    }
}

/// Upstream target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "github.com:22" or "ssh.github.com:443").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "github.com:22".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout.
    #[serde(with = "duration")]
    pub dial: Duration,

    /// Absolute per-session deadline measured from upstream connect. 0 disables.
    #[serde(with = "duration")]
    pub idle: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial: Duration::from_secs(5),
            idle: Duration::ZERO,
        }
    }
}

/// TCP socket options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TcpConfig {
    /// Keepalive period in seconds. 0 disables.
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self { keepalive_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
