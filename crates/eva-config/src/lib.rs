//! Layered configuration shared by the EVA daemon and its tooling.
//!
//! Values resolve in the order defaults, configuration file, environment
//! (`EVA_*`) and finally command-line flags, with later layers overriding
//! earlier ones. Loading is delegated to [`ortho_config`]; this crate owns the
//! schema, the built-in defaults and the socket endpoint type used by the
//! transport adapter.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_IN_FLIGHT, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TCP_PORT,
    default_log_filter, default_log_filter_string, default_log_format, default_max_in_flight,
    default_request_timeout_ms, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration for the EVA daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "EVA")]
pub struct Config {
    /// Endpoint the transport adapter listens on.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression, for example `info` or `evad=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Deadline applied to each request, in milliseconds.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    /// Maximum number of requests processed concurrently.
    #[ortho_config(default = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            request_timeout_ms: default_request_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Config {
    /// Endpoint the daemon binds.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Per-request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Upper bound on concurrently processed requests.
    ///
    /// A configured value of zero is treated as one so the daemon can always
    /// make progress.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(
            config.request_timeout(),
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
        );
        assert_eq!(config.max_in_flight(), DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn zero_in_flight_limit_is_clamped() {
        let config = Config {
            max_in_flight: 0,
            ..Config::default()
        };
        assert_eq!(config.max_in_flight(), 1);
    }
}
