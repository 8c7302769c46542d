//! Command-line flags with environment fallbacks.
//!
//! Precedence: flag > environment variable > config file > built-in default.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::duration::parse_duration;
use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::RelayConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Default, Parser)]
#[command(name = "ssh-forward")]
#[command(version, about = "Transparent TCP relay to a fixed upstream (e.g. an SSH endpoint)", long_about = None)]
pub struct Args {
    /// Optional TOML config file
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local listen address (host:port)
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen: Option<String>,

    /// Upstream address (host:port), e.g. github.com:22 or ssh.github.com:443
    #[arg(long, env = "UPSTREAM_ADDR")]
    pub upstream: Option<String>,

    /// Timeout for dialing upstream (e.g. 5s)
    #[arg(long, env = "DIAL_TIMEOUT", value_parser = parse_duration)]
    pub dial_timeout: Option<Duration>,

    /// Per-connection idle timeout, 0 to disable (e.g. 10m)
    #[arg(long, env = "IDLE_TIMEOUT", value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// TCP keepalive period in seconds, 0 disables
    #[arg(long, env = "TCP_KEEPALIVE")]
    pub keepalive: Option<u64>,

    /// Maximum concurrent connections, 0 for unbounded
    #[arg(long, env = "MAX_CONNS")]
    pub max_conns: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<String>,
}

impl Args {
    /// Resolve the effective configuration and validate it.
    pub fn into_config(self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => RelayConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut RelayConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(upstream) = self.upstream {
            config.upstream.address = upstream;
        }
        if let Some(dial) = self.dial_timeout {
            config.timeouts.dial = dial;
        }
        if let Some(idle) = self.idle_timeout {
            config.timeouts.idle = idle;
        }
        if let Some(keepalive) = self.keepalive {
            config.tcp.keepalive_secs = keepalive;
        }
        if let Some(max) = self.max_conns {
            config.listener.max_connections = max;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "ssh-forward",
            "--listen",
            "127.0.0.1:2222",
            "--upstream",
            "ssh.github.com:443",
            "--dial-timeout",
            "250ms",
            "--idle-timeout",
            "1m",
            "--keepalive",
            "0",
            "--max-conns",
            "8",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:2222");
        assert_eq!(config.upstream.address, "ssh.github.com:443");
        assert_eq!(config.dial_timeout(), Duration::from_millis(250));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.keepalive(), None);
        assert_eq!(config.max_connections(), Some(8));
    }

    #[test]
    fn metrics_flag_enables_exporter() {
        let args = Args {
            metrics_address: Some("127.0.0.1:9999".into()),
            ..Args::default()
        };
        let config = args.into_config().unwrap();
        assert!(config.observability.metrics_enabled);
        assert_eq!(config.observability.metrics_address, "127.0.0.1:9999");
    }

    #[test]
    fn invalid_override_fails_validation() {
        let args = Args {
            upstream: Some("missing-port".into()),
            ..Args::default()
        };
        assert!(matches!(
            args.into_config(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_duration_flag() {
        let result = Args::try_parse_from(["ssh-forward", "--dial-timeout", "fast"]);
        assert!(result.is_err());
    }
}
