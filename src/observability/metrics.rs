//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_sessions_total` (counter): admitted sessions
//! - `relay_active_sessions` (gauge): sessions not yet closed
//! - `relay_dial_failures_total` (counter): failed upstream dials
//! - `relay_bytes_total` (counter): bytes copied, by direction
//! - `relay_copy_errors_total` (counter): copy errors, by direction
//! - `relay_accept_errors_total` (counter): transient accept failures
//! - `relay_session_duration_seconds` (histogram): admitted → closed
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_session_opened() {
    counter!("relay_sessions_total").increment(1);
    gauge!("relay_active_sessions").increment(1.0);
}

pub fn record_session_closed(duration: Duration) {
    gauge!("relay_active_sessions").decrement(1.0);
    histogram!("relay_session_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_dial_failure() {
    counter!("relay_dial_failures_total").increment(1);
}

pub fn record_bytes(direction: &'static str, bytes: u64) {
    counter!("relay_bytes_total", "direction" => direction).increment(bytes);
}

pub fn record_copy_error(direction: &'static str) {
    counter!("relay_copy_errors_total", "direction" => direction).increment(1);
}

pub fn record_accept_error() {
    counter!("relay_accept_errors_total").increment(1);
}
