//! Byte-stream transport to the cluster daemon.
//!
//! [`Connection`] wraps the Unix or TCP stream opened for a
//! [`SocketEndpoint`](quorate_config::SocketEndpoint); the framed transport
//! layered on top moves whole frames across any [`Stream`].

mod connection;
mod framed;

use std::io::{self, Read, Write};
use std::net::TcpStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

pub use self::connection::{CONNECTION_TIMEOUT, Connection, connect};
pub(crate) use self::framed::FramedTransport;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Bidirectional byte stream a session can run over.
pub trait Stream: Read + Write {
    /// Switches between blocking and non-blocking reads.
    ///
    /// # Errors
    ///
    /// Propagates failures from the underlying socket.
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
}

impl Stream for TcpStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        Self::set_nonblocking(&*self, nonblocking)
    }
}

#[cfg(unix)]
impl Stream for UnixStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        Self::set_nonblocking(&*self, nonblocking)
    }
}
