//! Shared configuration for the quorate client library and command-line tool.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file (`--config-path` or `QUORATE_CONFIG_PATH`), then
//! `QUORATE_*` environment variables, then command-line flags.

mod defaults;
mod logging;
mod socket;

use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ADMIN_SOCKET_PATH, DEFAULT_CLIENT_SOCKET_PATH, DEFAULT_LOG_FILTER,
    default_admin_socket, default_client_socket, default_log_filter, default_log_filter_string,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use ortho_config::{OrthoConfig, OrthoError};
pub use socket::{SocketEndpoint, SocketParseError};

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "QUORATE")]
pub struct Config {
    /// Socket used for ordinary queries and data traffic.
    #[serde(default = "default_client_socket")]
    pub client_socket: SocketEndpoint,
    /// Socket used for privileged cluster changes.
    #[serde(default = "default_admin_socket")]
    pub admin_socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log records.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_socket: default_client_socket(),
            admin_socket: default_admin_socket(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint for ordinary client sessions.
    #[must_use]
    pub const fn client_socket(&self) -> &SocketEndpoint {
        &self.client_socket
    }

    /// Endpoint for administrative sessions.
    #[must_use]
    pub const fn admin_socket(&self) -> &SocketEndpoint {
        &self.admin_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
