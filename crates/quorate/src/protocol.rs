//! Wire format shared with the cluster daemon.
//!
//! Every message is a [`Frame`]: a 16-byte header followed by a
//! command-specific payload. All header and payload integers are
//! little-endian.
//!
//! | offset | field        | type |
//! |--------|--------------|------|
//! | 0      | protocol tag | u32  |
//! | 4      | command      | u32  |
//! | 8      | flags        | u32  |
//! | 12     | total length | u32  |

use std::fmt;

use crate::error::FramingError;
use crate::handler::{DataMessage, Event, EventReason};

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 16;

/// Constant identifying this protocol family at the start of every header.
pub const PROTOCOL_TAG: u32 = 0x434D_414E;

/// Largest frame, header included, accepted in either direction.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/// Bytes preceding the application buffer in a data payload.
pub const DATA_PREAMBLE_LEN: usize = 8;

/// Bytes preceding the result body in a reply payload.
pub const REPLY_PREAMBLE_LEN: usize = 4;

/// Size of an event payload.
pub const EVENT_PAYLOAD_LEN: usize = 8;

const HEADER_LEN_U32: u32 = 16;

/// Command code carried in the second header word.
///
/// The low 16 bits select the operation; the high bits carry flags such as
/// [`Command::REPLY_FLAG`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command(u32);

impl Command {
    /// Set on every frame answering a request.
    pub const REPLY_FLAG: u32 = 0x4000_0000;
    /// Set on commands only accepted over the administrative socket.
    pub const PRIVILEGED_FLAG: u32 = 0x1000_0000;
    /// Selects the operation bits of a command word.
    pub const CODE_MASK: u32 = 0x0000_FFFF;

    /// Updates the expected vote count.
    pub const SET_EXPECTED_VOTES: Self = Self(Self::PRIVILEGED_FLAG | 0x04);
    /// Asks whether the cluster has quorum.
    pub const IS_QUORATE: Self = Self(0x05);
    /// Asks whether a node listens on a port.
    pub const IS_LISTENING: Self = Self(0x06);
    /// Reports the member count as the status word.
    pub const GET_ALL_MEMBERS: Self = Self(0x07);
    /// Changes the votes held by a node.
    pub const SET_VOTES: Self = Self(Self::PRIVILEGED_FLAG | 0x08);
    /// Reads the protocol and configuration version.
    pub const GET_VERSION: Self = Self(0x09);
    /// Writes the protocol and configuration version.
    pub const SET_VERSION: Self = Self(Self::PRIVILEGED_FLAG | 0x0a);
    /// Evicts a node from the cluster.
    pub const KILL_NODE: Self = Self(Self::PRIVILEGED_FLAG | 0x0b);
    /// Reports the number of subsystems joined through this daemon.
    pub const GET_JOIN_COUNT: Self = Self(0x0c);
    /// Looks up one node by id or name.
    pub const GET_NODE: Self = Self(0x90);
    /// Reads the cluster name, number, and generation.
    pub const GET_CLUSTER: Self = Self(0x91);
    /// Barrier management; the request selects the barrier action.
    pub const BARRIER: Self = Self(0xa0);
    /// Asks whether the cluster software is running.
    pub const IS_ACTIVE: Self = Self(0xb0);
    /// Renames the local node.
    pub const SET_NODE_NAME: Self = Self(Self::PRIVILEGED_FLAG | 0xb1);
    /// Assigns the local node id.
    pub const SET_NODE_ID: Self = Self(Self::PRIVILEGED_FLAG | 0xb2);
    /// Leaves the cluster.
    pub const LEAVE_CLUSTER: Self = Self(Self::PRIVILEGED_FLAG | 0xb4);
    /// Registers the quorum device.
    pub const REGISTER_QUORUM_DEVICE: Self = Self(Self::PRIVILEGED_FLAG | 0xb5);
    /// Unregisters the quorum device.
    pub const UNREGISTER_QUORUM_DEVICE: Self = Self(Self::PRIVILEGED_FLAG | 0xb6);
    /// Reports quorum device availability.
    pub const POLL_QUORUM_DEVICE: Self = Self(Self::PRIVILEGED_FLAG | 0xb7);
    /// Adds a multicast address for cluster traffic.
    pub const ADD_MULTICAST: Self = Self(Self::PRIVILEGED_FLAG | 0xb8);
    /// Adds a local interface address for cluster traffic.
    pub const ADD_INTERFACE: Self = Self(Self::PRIVILEGED_FLAG | 0xb9);
    /// Application data exchanged between nodes.
    pub const DATA: Self = Self(0x100);
    /// Binds the session to a data port.
    pub const BIND: Self = Self(0x101);
    /// Out-of-band event notification.
    pub const EVENT: Self = Self(0x102);

    /// Wraps a raw command word.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw command word including flag bits.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Operation bits with all flags removed.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0 & Self::CODE_MASK
    }

    /// Returns true when the reply flag is set.
    #[must_use]
    pub const fn is_reply(self) -> bool {
        self.0 & Self::REPLY_FLAG != 0
    }

    /// Returns true when the command requires the administrative socket.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        self.0 & Self::PRIVILEGED_FLAG != 0
    }

    /// The same command with the reply flag set.
    #[must_use]
    pub const fn as_reply(self) -> Self {
        Self(self.0 | Self::REPLY_FLAG)
    }

    fn name(self) -> Option<&'static str> {
        let request = Self(self.0 & !Self::REPLY_FLAG);
        let name = match request {
            Self::SET_EXPECTED_VOTES => "set-expected-votes",
            Self::IS_QUORATE => "is-quorate",
            Self::IS_LISTENING => "is-listening",
            Self::GET_ALL_MEMBERS => "get-all-members",
            Self::SET_VOTES => "set-votes",
            Self::GET_VERSION => "get-version",
            Self::SET_VERSION => "set-version",
            Self::KILL_NODE => "kill-node",
            Self::GET_JOIN_COUNT => "get-join-count",
            Self::GET_NODE => "get-node",
            Self::GET_CLUSTER => "get-cluster",
            Self::BARRIER => "barrier",
            Self::IS_ACTIVE => "is-active",
            Self::SET_NODE_NAME => "set-node-name",
            Self::SET_NODE_ID => "set-node-id",
            Self::LEAVE_CLUSTER => "leave-cluster",
            Self::REGISTER_QUORUM_DEVICE => "register-quorum-device",
            Self::UNREGISTER_QUORUM_DEVICE => "unregister-quorum-device",
            Self::POLL_QUORUM_DEVICE => "poll-quorum-device",
            Self::ADD_MULTICAST => "add-multicast",
            Self::ADD_INTERFACE => "add-interface",
            Self::DATA => "data",
            Self::BIND => "bind",
            Self::EVENT => "event",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) if self.is_reply() => write!(formatter, "{name} reply"),
            Some(name) => formatter.write_str(name),
            None => write!(formatter, "command {:#010x}", self.0),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Command({self})")
    }
}

/// Identifier of a cluster node. Zero addresses every node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(i32);

impl NodeId {
    /// Broadcast address used by data frames.
    pub const ALL: Self = Self(0);

    /// Wraps a raw node id.
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw node id.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Decoded fixed header of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Command word, flag bits included.
    pub command: Command,
    /// Command-specific modifier bits.
    pub flags: u32,
    /// Header size plus payload size.
    pub length: u32,
}

impl FrameHeader {
    /// Parses and validates a header read from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError`] when the protocol tag is wrong or the
    /// declared length is outside `HEADER_LEN..=MAX_FRAME_LEN`.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self, FramingError> {
        let word = |offset: usize| read_u32(bytes, offset).unwrap_or_default();
        let tag = word(0);
        if tag != PROTOCOL_TAG {
            return Err(FramingError::ProtocolTag { found: tag });
        }
        let length = word(12);
        if length < HEADER_LEN_U32 {
            return Err(FramingError::TooShort {
                length,
                minimum: HEADER_LEN_U32,
            });
        }
        if length > MAX_FRAME_LEN {
            return Err(FramingError::TooLong {
                length,
                maximum: MAX_FRAME_LEN,
            });
        }
        Ok(Self {
            command: Command::from_raw(word(4)),
            flags: word(8),
            length,
        })
    }

    /// Serialises the header including the protocol tag.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0_u8; HEADER_LEN];
        let words = [PROTOCOL_TAG, self.command.raw(), self.flags, self.length];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&encode_u32(word));
        }
        out
    }

    /// Number of payload bytes following the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        usize::try_from(self.length)
            .unwrap_or(usize::MAX)
            .saturating_sub(HEADER_LEN)
    }
}

/// One complete protocol message: header followed by payload.
///
/// A frame owns its bytes; queues and handlers never see the transport's
/// read buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    bytes: Vec<u8>,
}

impl Frame {
    /// Builds a frame from a command, flag word, and payload.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::TooLong`] when the frame would exceed
    /// [`MAX_FRAME_LEN`].
    pub fn new(command: Command, flags: u32, payload: &[u8]) -> Result<Self, FramingError> {
        let length = HEADER_LEN
            .checked_add(payload.len())
            .and_then(|total| u32::try_from(total).ok())
            .filter(|total| *total <= MAX_FRAME_LEN)
            .ok_or(FramingError::TooLong {
                length: u32::try_from(HEADER_LEN.saturating_add(payload.len()))
                    .unwrap_or(u32::MAX),
                maximum: MAX_FRAME_LEN,
            })?;
        let header = FrameHeader {
            command,
            flags,
            length,
        };
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(payload);
        Ok(Self { header, bytes })
    }

    /// Builds a request frame for `command`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::TooLong`] for oversized payloads.
    pub fn request(command: Command, payload: &[u8]) -> Result<Self, FramingError> {
        Self::new(command, 0, payload)
    }

    /// Builds the daemon's answer to `command`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::TooLong`] for oversized bodies.
    pub fn reply(command: Command, status: i32, body: &[u8]) -> Result<Self, FramingError> {
        let mut payload = Vec::with_capacity(REPLY_PREAMBLE_LEN + body.len());
        payload.extend_from_slice(&encode_i32(status));
        payload.extend_from_slice(body);
        Self::new(command.as_reply(), 0, &payload)
    }

    /// Builds a data frame addressed to, or received from, `node`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::TooLong`] for oversized payloads.
    pub fn data(node: NodeId, port: u8, flags: u32, payload: &[u8]) -> Result<Self, FramingError> {
        let mut body = Vec::with_capacity(DATA_PREAMBLE_LEN + payload.len());
        body.extend_from_slice(&encode_i32(node.get()));
        body.extend_from_slice(&[port, 0, 0, 0]);
        body.extend_from_slice(payload);
        Self::new(Command::DATA, flags, &body)
    }

    /// Builds an event frame.
    #[must_use]
    pub fn event(reason: EventReason, argument: i32) -> Self {
        let mut payload = [0_u8; EVENT_PAYLOAD_LEN];
        let (head, tail) = payload.split_at_mut(4);
        head.copy_from_slice(&encode_i32(reason.raw()));
        tail.copy_from_slice(&encode_i32(argument));
        let length = HEADER_LEN_U32 + 8;
        let header = FrameHeader {
            command: Command::EVENT,
            flags: 0,
            length,
        };
        let mut bytes = Vec::with_capacity(HEADER_LEN + EVENT_PAYLOAD_LEN);
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&payload);
        Self { header, bytes }
    }

    /// Reassembles a frame from a validated header and its full wire bytes.
    pub(crate) const fn from_wire(header: FrameHeader, bytes: Vec<u8>) -> Self {
        Self { header, bytes }
    }

    /// Decoded header.
    #[must_use]
    pub const fn header(&self) -> FrameHeader {
        self.header
    }

    /// Command word of the frame.
    #[must_use]
    pub const fn command(&self) -> Command {
        self.header.command
    }

    /// Bytes following the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(HEADER_LEN..).unwrap_or_default()
    }

    /// Full wire representation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total size on the wire, header included.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.bytes.len()
    }

    /// Splits a reply payload into its status word and result body.
    #[must_use]
    pub fn reply_parts(&self) -> Option<(i32, &[u8])> {
        let payload = self.payload();
        let status = read_i32(payload, 0)?;
        let body = payload.get(REPLY_PREAMBLE_LEN..)?;
        Some((status, body))
    }

    /// Views a data payload.
    #[must_use]
    pub fn data_message(&self) -> Option<DataMessage<'_>> {
        let payload = self.payload();
        let source = NodeId::new(read_i32(payload, 0)?);
        let port = *payload.get(4)?;
        let body = payload.get(DATA_PREAMBLE_LEN..)?;
        Some(DataMessage {
            source,
            port,
            flags: self.header.flags,
            payload: body,
        })
    }

    /// Decodes an event payload.
    #[must_use]
    pub fn event_message(&self) -> Option<Event> {
        let payload = self.payload();
        Some(Event {
            reason: EventReason::from_raw(read_i32(payload, 0)?),
            argument: read_i32(payload, 4)?,
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Frame")
            .field("command", &self.header.command)
            .field("flags", &self.header.flags)
            .field("length", &self.header.length)
            .finish_non_exhaustive()
    }
}

/// Little-endian encoders used by request builders.
#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) const fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) const fn encode_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) const fn encode_u64(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) const fn encode_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let field: [u8; 2] = bytes.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
    Some(u16::from_le_bytes(field))
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let field: [u8; 8] = bytes.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
    Some(u64::from_le_bytes(field))
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let field: [u8; 4] = bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_le_bytes(field))
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is defined as little-endian"
)]
pub(crate) fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    let field: [u8; 4] = bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(i32::from_le_bytes(field))
}
