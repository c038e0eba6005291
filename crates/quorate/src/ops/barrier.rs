//! Cluster-wide barriers.
//!
//! Barrier requests share one command; the first byte of the payload selects
//! the action. Payload layout:
//!
//! | offset | field              |
//! |--------|--------------------|
//! | 0      | action (u8)        |
//! | 1      | name, NUL padded   |
//! | 36     | flags (u32)        |
//! | 40     | argument (i32)     |

use std::ops::BitOr;

use super::validate_name;
use crate::error::ClientError;
use crate::protocol::{Command, encode_i32, encode_u32};
use crate::session::Session;
use crate::transport::Stream;

/// Longest barrier name accepted by the daemon.
pub const MAX_BARRIER_NAME_LEN: usize = 32;

const NAME_OFFSET: usize = 1;
const FLAGS_OFFSET: usize = 36;
const ARG_OFFSET: usize = 40;
const REQUEST_LEN: usize = 44;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Register = 1,
    Change = 2,
    Delete = 3,
    Wait = 4,
}

/// Attribute bits for barrier registration and changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BarrierFlags(u32);

impl BarrierFlags {
    /// No attributes.
    pub const NONE: Self = Self(0);
    /// Delete the barrier once every node has reached it.
    pub const AUTODELETE: Self = Self(1);
    /// Allow the barrier to be reused after release.
    pub const MULTISTEP: Self = Self(1 << 1);
    /// Release only on an explicit change.
    pub const MANUAL_RELEASE: Self = Self(1 << 2);
    /// Enable the barrier.
    pub const ENABLED: Self = Self(1 << 3);
    /// The argument carries the expected node count.
    pub const NODES: Self = Self(1 << 4);
    /// The argument carries a timeout in seconds.
    pub const TIMEOUT: Self = Self(1 << 6);

    /// Raw attribute bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for BarrierFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

fn encode_request(
    action: Action,
    name: &str,
    flags: BarrierFlags,
    argument: i32,
) -> Result<[u8; REQUEST_LEN], ClientError> {
    validate_name(name, MAX_BARRIER_NAME_LEN, "name")?;
    let mut request = [0_u8; REQUEST_LEN];
    if let Some(slot) = request.first_mut() {
        *slot = action as u8;
    }
    if let Some(slot) = request.get_mut(NAME_OFFSET..NAME_OFFSET + name.len()) {
        slot.copy_from_slice(name.as_bytes());
    }
    if let Some(slot) = request.get_mut(FLAGS_OFFSET..ARG_OFFSET) {
        slot.copy_from_slice(&encode_u32(flags.bits()));
    }
    if let Some(slot) = request.get_mut(ARG_OFFSET..REQUEST_LEN) {
        slot.copy_from_slice(&encode_i32(argument));
    }
    Ok(request)
}

impl<S: Stream> Session<S> {
    /// Registers barrier `name`, expecting `nodes` participants (zero means
    /// every member).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty or over-long names.
    pub fn barrier_register(
        &mut self,
        name: &str,
        flags: BarrierFlags,
        nodes: i32,
    ) -> Result<u32, ClientError> {
        let request = encode_request(Action::Register, name, flags, nodes)?;
        self.status_call(Command::BARRIER, &request)
    }

    /// Changes the attribute selected by `flags` to `argument`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty or over-long names.
    pub fn barrier_change(
        &mut self,
        name: &str,
        flags: BarrierFlags,
        argument: i32,
    ) -> Result<u32, ClientError> {
        let request = encode_request(Action::Change, name, flags, argument)?;
        self.status_call(Command::BARRIER, &request)
    }

    /// Blocks until every participant has reached barrier `name`.
    ///
    /// Data frames and events arriving while waiting are queued.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty or over-long names.
    pub fn barrier_wait(&mut self, name: &str) -> Result<u32, ClientError> {
        let request = encode_request(Action::Wait, name, BarrierFlags::NONE, 0)?;
        self.status_call(Command::BARRIER, &request)
    }

    /// Deletes barrier `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty or over-long names.
    pub fn barrier_delete(&mut self, name: &str) -> Result<u32, ClientError> {
        let request = encode_request(Action::Delete, name, BarrierFlags::NONE, 0)?;
        self.status_call(Command::BARRIER, &request)
    }
}
