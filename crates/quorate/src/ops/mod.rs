//! Typed cluster operations layered on [`Session::call`].
//!
//! Every operation validates its arguments before touching the connection,
//! encodes a request payload, and waits for the daemon's reply. Privileged
//! operations are only accepted on a session opened with
//! [`Session::open_admin`].

mod barrier;
mod data;
mod membership;
mod node_record;
mod quorum_device;

pub use self::barrier::{BarrierFlags, MAX_BARRIER_NAME_LEN};
pub use self::membership::{MAX_NODES_PER_REPLY, Version};
#[cfg(test)]
pub(crate) use self::node_record::encode_cluster_info;
pub use self::node_record::{ClusterInfo, NODE_RECORD_LEN, Node};
pub use self::quorum_device::MAX_QUORUM_DEVICE_NAME_LEN;

use crate::error::ClientError;
use crate::protocol::Command;
use crate::session::Session;
use crate::transport::Stream;

impl<S: Stream> Session<S> {
    /// Issues a request whose reply carries no body.
    fn status_call(&mut self, command: Command, payload: &[u8]) -> Result<u32, ClientError> {
        self.call(command, payload, &mut [])
    }
}

fn require_non_zero(value: i32, argument: &'static str) -> Result<(), ClientError> {
    if value == 0 {
        return Err(ClientError::InvalidArgument {
            argument,
            reason: "must be non-zero",
        });
    }
    Ok(())
}

/// Checks that `name` is non-empty, at most `max_len` bytes, and free of NUL.
fn validate_name(name: &str, max_len: usize, argument: &'static str) -> Result<(), ClientError> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.len() > max_len {
        "is too long"
    } else if name.as_bytes().contains(&0) {
        "must not contain NUL bytes"
    } else {
        return Ok(());
    };
    Err(ClientError::InvalidArgument { argument, reason })
}
