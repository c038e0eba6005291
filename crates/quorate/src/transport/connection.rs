//! Dialling the cluster daemon.
//!
//! The daemon normally listens on a pair of local sockets, one open to every
//! user and one reserved for privileged callers. A TCP endpoint is accepted
//! for daemons reached through a relay. Either way the caller gets back one
//! [`Connection`] that the framed transport drives in blocking or
//! non-blocking mode.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use quorate_config::SocketEndpoint;
use tracing::{debug, trace};

#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use super::{Stream, TRANSPORT_TARGET};
use crate::error::ClientError;

/// Upper bound on each attempt to reach the daemon.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket connected to the cluster daemon.
#[derive(Debug)]
pub enum Connection {
    /// Relayed daemon reached over TCP.
    Tcp(TcpStream),
    /// Local daemon socket.
    #[cfg(unix)]
    Unix(UnixStream),
}

macro_rules! with_stream {
    ($connection:expr, $stream:ident => $body:expr) => {
        match $connection {
            Connection::Tcp($stream) => $body,
            #[cfg(unix)]
            Connection::Unix($stream) => $body,
        }
    };
}

impl Connection {
    /// Name of the transport carrying this connection.
    #[must_use]
    pub const fn transport(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            #[cfg(unix)]
            Self::Unix(_) => "unix",
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        with_stream!(self, stream => stream.read(buf))
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        with_stream!(self, stream => stream.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        with_stream!(self, stream => stream.flush())
    }
}

impl Stream for Connection {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        with_stream!(self, stream => stream.set_nonblocking(nonblocking))
    }
}

#[cfg(unix)]
impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        with_stream!(self, stream => stream.as_raw_fd())
    }
}

/// Where a dial attempt gave up.
#[derive(Debug)]
enum DialFailure {
    Resolve(io::Error),
    Connect(io::Error),
}

impl DialFailure {
    fn into_client_error(self, endpoint: &SocketEndpoint) -> ClientError {
        let endpoint = endpoint.to_string();
        match self {
            Self::Resolve(source) => ClientError::Resolve { endpoint, source },
            Self::Connect(source) => ClientError::Connect { endpoint, source },
        }
    }
}

/// Opens a blocking connection to the daemon at `endpoint`.
///
/// TCP host names may resolve to several addresses; each is tried in turn
/// and the first one that accepts wins. Small request frames are sent
/// without Nagle delay.
///
/// # Errors
///
/// Returns [`ClientError::Resolve`] when a TCP host yields no address and
/// [`ClientError::Connect`] when no address accepts the connection. On
/// platforms without Unix sockets a Unix endpoint yields
/// [`ClientError::UnsupportedUnixTransport`].
pub fn connect(endpoint: &SocketEndpoint) -> Result<Connection, ClientError> {
    debug!(target: TRANSPORT_TARGET, %endpoint, "dialling cluster daemon");
    let dialled = match endpoint {
        SocketEndpoint::Tcp { host, port } => dial_tcp(host, *port),
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                dial_unix(path.as_str())
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(ClientError::UnsupportedUnixTransport(endpoint.to_string()));
            }
        }
    };
    let connection = dialled.map_err(|failure| failure.into_client_error(endpoint))?;
    debug!(
        target: TRANSPORT_TARGET,
        %endpoint,
        transport = connection.transport(),
        "connected to cluster daemon"
    );
    Ok(connection)
}

fn dial_tcp(host: &str, port: u16) -> Result<Connection, DialFailure> {
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(DialFailure::Resolve)?
        .collect();
    let mut last_error = None;
    for address in candidates {
        match TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(DialFailure::Connect)?;
                return Ok(Connection::Tcp(stream));
            }
            Err(error) => {
                trace!(target: TRANSPORT_TARGET, %address, %error, "address refused");
                last_error = Some(error);
            }
        }
    }
    Err(match last_error {
        Some(error) => DialFailure::Connect(error),
        None => DialFailure::Resolve(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} resolved to no addresses"),
        )),
    })
}

#[cfg(unix)]
fn dial_unix(path: &str) -> Result<Connection, DialFailure> {
    // socket2 sets close-on-exec when it creates the descriptor.
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(DialFailure::Connect)?;
    let address = SockAddr::unix(path).map_err(DialFailure::Connect)?;
    socket
        .connect_timeout(&address, CONNECTION_TIMEOUT)
        .map_err(DialFailure::Connect)?;
    Ok(Connection::Unix(UnixStream::from(socket)))
}
