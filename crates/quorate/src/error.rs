//! Error taxonomy for client sessions.

use std::io;

use thiserror::Error;

use crate::protocol::Command;

/// Errors surfaced by a [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum ClientError {
    /// A caller-supplied parameter was rejected before any I/O took place.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        argument: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// The daemon closed or reset the connection.
    #[error("cluster daemon is unreachable: connection closed by peer")]
    PeerUnreachable,
    /// Any other transport failure.
    #[error("transport failure: {0}")]
    Io(#[source] io::Error),
    /// The byte stream no longer lines up with frame boundaries.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    /// The daemon answered a request with a negative status word.
    #[error("daemon rejected {command} with error code {code}")]
    Application {
        /// Command that was rejected.
        command: Command,
        /// Negated status word (an errno-style code).
        code: i32,
    },
    /// A reply body was shorter than its command requires.
    #[error("{command} reply carried {actual} body bytes, expected {expected}")]
    MalformedReply {
        /// Command whose reply was malformed.
        command: Command,
        /// Body length the command requires.
        expected: usize,
        /// Body length received.
        actual: usize,
    },
    /// Records in a reply body do not have the size this client decodes.
    #[error("{command} reply records are {actual} bytes, expected {expected}")]
    RecordSize {
        /// Command whose reply carried the records.
        command: Command,
        /// Record size this client understands.
        expected: usize,
        /// Record size announced by the daemon.
        actual: usize,
    },
    /// Name resolution for a TCP endpoint failed.
    #[error("failed to resolve daemon address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Connecting to the daemon endpoint failed.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        /// Endpoint being dialled.
        endpoint: String,
        /// Underlying connection error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are unavailable on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
}

impl ClientError {
    /// Returns true when the daemon side of the connection has gone away.
    #[must_use]
    pub const fn is_peer_unreachable(&self) -> bool {
        matches!(self, Self::PeerUnreachable)
    }

    /// Returns the daemon's error code for application failures.
    #[must_use]
    pub const fn application_code(&self) -> Option<i32> {
        match self {
            Self::Application { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn from_io(error: io::Error) -> Self {
        if is_disconnect(error.kind()) {
            Self::PeerUnreachable
        } else {
            Self::Io(error)
        }
    }
}

/// Violations of the frame layout detected while reading a header.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The header did not start with the protocol tag.
    #[error("unexpected protocol tag {found:#010x}")]
    ProtocolTag {
        /// Tag found on the wire.
        found: u32,
    },
    /// The declared length cannot hold the header.
    #[error("frame length {length} is shorter than the {minimum}-byte header")]
    TooShort {
        /// Declared total length.
        length: u32,
        /// Header size.
        minimum: u32,
    },
    /// The declared length exceeds the frame ceiling.
    #[error("frame length {length} exceeds the {maximum}-byte limit")]
    TooLong {
        /// Declared total length.
        length: u32,
        /// Largest accepted frame.
        maximum: u32,
    },
}

/// Condition that left a session unable to make progress.
///
/// Once recorded, every later dispatch or call on the session fails with the
/// corresponding [`ClientError`] without touching the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The daemon closed or reset the connection.
    PeerUnreachable,
    /// The transport failed with the given error kind.
    Io(io::ErrorKind),
    /// The stream lost frame alignment.
    Framing(FramingError),
}

impl Fault {
    /// Classifies an error, returning `None` for errors that leave the
    /// connection usable.
    pub(crate) fn from_error(error: &ClientError) -> Option<Self> {
        match error {
            ClientError::PeerUnreachable => Some(Self::PeerUnreachable),
            ClientError::Io(source) => Some(Self::Io(source.kind())),
            ClientError::Framing(framing) => Some(Self::Framing(*framing)),
            _ => None,
        }
    }

    pub(crate) fn to_error(self) -> ClientError {
        match self {
            Self::PeerUnreachable => ClientError::PeerUnreachable,
            Self::Io(kind) => ClientError::Io(io::Error::new(kind, "session faulted earlier")),
            Self::Framing(framing) => ClientError::Framing(framing),
        }
    }
}

const fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::WriteZero
    )
}
