//! Server Configuration
//!
//! Command-line flags for the `flashkv` binary. Library users build
//! [`ConnectionConfig`] and [`ExpiryConfig`] directly instead.

use crate::connection::ConnectionConfig;
use crate::storage::ExpiryConfig;
use clap::Parser;
use std::time::Duration;

/// FlashKV - an in-memory data-structure server
#[derive(Debug, Clone, Parser)]
#[command(name = "flashkv", version, about)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(long, default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Close a connection after this many seconds without input (at least 1)
    #[arg(long = "idle-timeout", default_value_t = 300, value_name = "SECONDS")]
    pub idle_timeout_secs: u64,

    /// Milliseconds between background expiry sweeps
    #[arg(long = "sweep-interval-ms", default_value_t = 1000, value_name = "MILLIS")]
    pub sweep_interval_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.max(1)),
            ..ConnectionConfig::default()
        }
    }

    pub fn expiry(&self) -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(self.sweep_interval_ms.max(1)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["flashkv"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.connection().idle_timeout, Duration::from_secs(300));
        assert_eq!(config.expiry().interval, Duration::from_secs(1));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::parse_from([
            "flashkv",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--idle-timeout",
            "5",
            "--sweep-interval-ms",
            "250",
            "--log-level",
            "debug",
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(config.connection().idle_timeout, Duration::from_secs(5));
        assert_eq!(config.expiry().interval, Duration::from_millis(250));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_zero_intervals_floor() {
        let config = ServerConfig::parse_from([
            "flashkv",
            "--idle-timeout",
            "0",
            "--sweep-interval-ms",
            "0",
        ]);
        assert_eq!(config.connection().idle_timeout, Duration::from_secs(1));
        assert_eq!(config.expiry().interval, Duration::from_millis(1));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(ServerConfig::try_parse_from(["flashkv", "--port", "nope"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        ServerConfig::command().debug_assert();
    }
}
