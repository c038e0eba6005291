//! Cluster daemon endpoints.
//!
//! Endpoints are written either as a bare absolute path to a local daemon
//! socket (`/var/run/cman_client`) or as a URL: `unix:///var/run/cman_admin`
//! for a local socket and `tcp://host:port` for a relayed daemon.

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Where the cluster daemon listens.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Local daemon socket.
    Unix {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// Daemon reached through a TCP relay.
    Tcp {
        /// Relay host name or address.
        host: String,
        /// Relay port, never zero.
        port: u16,
    },
}

impl SocketEndpoint {
    /// Local daemon socket at `path`.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Relayed daemon at `host:port`.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    fn from_url(input: &str) -> Result<Self, SocketParseError> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => match url.path() {
                "" | "/" => Err(SocketParseError::NoPath(input.to_owned())),
                path => Ok(Self::unix(path)),
            },
            "tcp" => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| SocketParseError::NoHost(input.to_owned()))?;
                match url.port() {
                    None => Err(SocketParseError::NoPort(input.to_owned())),
                    Some(0) => Err(SocketParseError::ZeroPort(input.to_owned())),
                    Some(port) => Ok(Self::tcp(host, port)),
                }
            }
            other => Err(SocketParseError::UnknownScheme {
                scheme: other.to_owned(),
                input: input.to_owned(),
            }),
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.starts_with('/') {
            return Ok(Self::unix(input));
        }
        Self::from_url(input)
    }
}

/// Why a daemon endpoint could not be parsed.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was neither `unix` nor `tcp`.
    #[error("daemon endpoint '{input}' uses scheme '{scheme}'; expected unix or tcp")]
    UnknownScheme {
        /// Scheme found in the endpoint.
        scheme: String,
        /// Endpoint as written.
        input: String,
    },
    /// TCP endpoint without a host.
    #[error("relay endpoint '{0}' names no host")]
    NoHost(String),
    /// TCP endpoint without a port.
    #[error("relay endpoint '{0}' names no port")]
    NoPort(String),
    /// Port zero cannot be dialled.
    #[error("relay endpoint '{0}' uses port 0")]
    ZeroPort(String),
    /// `unix` URL without a path.
    #[error("local daemon endpoint '{0}' names no socket path")]
    NoPath(String),
    /// Text was neither an absolute path nor a URL.
    #[error("daemon endpoint is not a path or URL: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/var/run/cman_client", SocketEndpoint::unix("/var/run/cman_client"))]
    #[case(" /var/run/cman_admin\n", SocketEndpoint::unix("/var/run/cman_admin"))]
    #[case("unix:///var/run/cman_admin", SocketEndpoint::unix("/var/run/cman_admin"))]
    #[case("tcp://relay.example:6809", SocketEndpoint::tcp("relay.example", 6809))]
    fn endpoints_parse(#[case] input: &str, #[case] expected: SocketEndpoint) {
        assert_eq!(input.parse::<SocketEndpoint>().unwrap(), expected);
    }

    #[test]
    fn local_sockets_display_as_unix_urls() {
        let endpoint = SocketEndpoint::unix("/var/run/cman_client");
        assert_eq!(endpoint.to_string(), "unix:///var/run/cman_client");
        assert_eq!(endpoint.to_string().parse::<SocketEndpoint>().unwrap(), endpoint);
    }

    #[rstest]
    #[case("udp://127.0.0.1:9", "uses scheme 'udp'")]
    #[case("tcp://127.0.0.1", "names no port")]
    #[case("tcp://127.0.0.1:0", "uses port 0")]
    #[case("unix://", "names no socket path")]
    #[case("cman_client", "not a path or URL")]
    fn malformed_endpoints_are_rejected(#[case] input: &str, #[case] expected: &str) {
        let error = input.parse::<SocketEndpoint>().unwrap_err();
        assert!(
            error.to_string().contains(expected),
            "unexpected error for {input}: {error}"
        );
    }
}
