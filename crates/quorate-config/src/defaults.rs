use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Well-known path of the daemon's unprivileged client socket.
pub const DEFAULT_CLIENT_SOCKET_PATH: &str = "/var/run/cman_client";

/// Well-known path of the daemon's administrative socket.
pub const DEFAULT_ADMIN_SOCKET_PATH: &str = "/var/run/cman_admin";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Endpoint used for ordinary client sessions.
#[must_use]
pub fn default_client_socket() -> SocketEndpoint {
    SocketEndpoint::unix(DEFAULT_CLIENT_SOCKET_PATH)
}

/// Endpoint used for sessions issuing privileged commands.
#[must_use]
pub fn default_admin_socket() -> SocketEndpoint {
    SocketEndpoint::unix(DEFAULT_ADMIN_SOCKET_PATH)
}
