//! Quorum device registration and liveness reporting.

use super::validate_name;
use crate::error::ClientError;
use crate::protocol::{Command, encode_i32};
use crate::session::Session;
use crate::transport::Stream;

/// Longest quorum device name accepted by the daemon.
pub const MAX_QUORUM_DEVICE_NAME_LEN: usize = 16;

impl<S: Stream> Session<S> {
    /// Registers a quorum device contributing `votes`. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty or over-long names.
    pub fn register_quorum_device(&mut self, name: &str, votes: i32) -> Result<(), ClientError> {
        validate_name(name, MAX_QUORUM_DEVICE_NAME_LEN, "name")?;
        let mut request = Vec::with_capacity(4 + name.len());
        request.extend_from_slice(&encode_i32(votes));
        request.extend_from_slice(name.as_bytes());
        self.status_call(Command::REGISTER_QUORUM_DEVICE, &request)
            .map(drop)
    }

    /// Removes the registered quorum device. Privileged.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn unregister_quorum_device(&mut self) -> Result<(), ClientError> {
        self.status_call(Command::UNREGISTER_QUORUM_DEVICE, &[])
            .map(drop)
    }

    /// Reports whether the quorum device is currently usable. Privileged.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn poll_quorum_device(&mut self, available: bool) -> Result<(), ClientError> {
        self.status_call(
            Command::POLL_QUORUM_DEVICE,
            &encode_i32(i32::from(available)),
        )
        .map(drop)
    }
}
