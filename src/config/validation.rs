//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate address shapes (`host:port`) and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a host:port address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: port must be non-zero")]
    ZeroPort { field: &'static str },

    #[error("timeouts.dial must be greater than zero")]
    ZeroDialTimeout,

    #[error("observability.log_level: unknown level {0:?}")]
    UnknownLogLevel(String),

    #[error("observability.metrics_address: {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a fully-resolved configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = check_host_port("listener.bind_address", &config.listener.bind_address, true) {
        errors.push(e);
    }
    if let Err(e) = check_host_port("upstream.address", &config.upstream.address, false) {
        errors.push(e);
    }

    if config.timeouts.dial.is_zero() {
        errors.push(ValidationError::ZeroDialTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a `host:port` pair. IPv6 hosts must be bracketed.
fn check_host_port(
    field: &'static str,
    value: &str,
    allow_zero_port: bool,
) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidAddress {
        field,
        value: value.to_string(),
    };

    let (host, port) = value.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || (host.contains(':') && !(host.starts_with('[') && host.ends_with(']'))) {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 && !allow_zero_port {
        return Err(ValidationError::ZeroPort { field });
    }
    Ok(())
}
