//! Membership, quorum, and node configuration queries.

use std::fmt;

use super::node_record::{CLUSTER_INFO_LEN, ClusterInfo, NODE_RECORD_LEN, Node, record_size};
use super::{require_non_zero, validate_name};
use crate::error::ClientError;
use crate::protocol::{Command, NodeId, encode_i32, encode_u32, read_u32};
use crate::session::Session;
use crate::transport::Stream;

const VERSION_LEN: usize = 16;

/// Longest node name accepted by the daemon.
const MAX_NODE_NAME_LEN: usize = 255;

/// Longest address string accepted for multicast and interface changes.
const MAX_ADDRESS_LEN: usize = 255;

/// Most node records a single reply frame can carry.
pub const MAX_NODES_PER_REPLY: usize = 160;

/// Protocol and configuration version reported by the daemon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Version {
    /// Protocol major version.
    pub major: u32,
    /// Protocol minor version.
    pub minor: u32,
    /// Protocol patch level.
    pub patch: u32,
    /// Cluster configuration version.
    pub config: u32,
}

impl Version {
    fn encode(self) -> [u8; VERSION_LEN] {
        let mut out = [0_u8; VERSION_LEN];
        let words = [self.major, self.minor, self.patch, self.config];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&encode_u32(word));
        }
        out
    }

    fn decode(body: &[u8]) -> Option<Self> {
        Some(Self {
            major: read_u32(body, 0)?,
            minor: read_u32(body, 4)?,
            patch: read_u32(body, 8)?,
            config: read_u32(body, 12)?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}.{}.{} (config {})",
            self.major, self.minor, self.patch, self.config
        )
    }
}

impl<S: Stream> Session<S> {
    /// Number of cluster members.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn node_count(&mut self) -> Result<u32, ClientError> {
        self.status_call(Command::GET_ALL_MEMBERS, &[])
    }

    /// Number of subsystems joined to the cluster through this daemon.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn subsystem_count(&mut self) -> Result<u32, ClientError> {
        self.status_call(Command::GET_JOIN_COUNT, &[])
    }

    /// Lists at most `max_nodes` cluster nodes.
    ///
    /// The daemon reports every node it knows about; records beyond
    /// `max_nodes` (or beyond [`MAX_NODES_PER_REPLY`]) are not returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when `max_nodes` is zero,
    /// [`ClientError::RecordSize`] when the daemon uses a different record
    /// layout, [`ClientError::MalformedReply`] when the body holds fewer
    /// records than announced, and propagates call failures.
    pub fn nodes(&mut self, max_nodes: usize) -> Result<Vec<Node>, ClientError> {
        if max_nodes == 0 {
            return Err(ClientError::InvalidArgument {
                argument: "max_nodes",
                reason: "must be at least one",
            });
        }
        let limit = max_nodes.min(MAX_NODES_PER_REPLY);
        let mut body = vec![0_u8; limit * NODE_RECORD_LEN];
        let reply = self
            .begin_call(Command::GET_ALL_MEMBERS, &[], &mut body)?
            .wait()?;
        let reported = usize::try_from(reply.into_status()?).unwrap_or(usize::MAX);
        let count = reported.min(limit);
        if count == 0 {
            return Ok(Vec::new());
        }

        let needed = count * NODE_RECORD_LEN;
        let malformed = ClientError::MalformedReply {
            command: Command::GET_ALL_MEMBERS,
            expected: needed,
            actual: reply.body_len,
        };
        let Some(records) = body.get(..needed).filter(|_| reply.copied >= needed) else {
            return Err(malformed);
        };
        check_record_size(Command::GET_ALL_MEMBERS, records)?;
        records
            .chunks_exact(NODE_RECORD_LEN)
            .map(Node::decode)
            .collect::<Option<Vec<_>>>()
            .ok_or(malformed)
    }

    /// Looks up node `id`. Id zero selects the local node.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RecordSize`] or [`ClientError::MalformedReply`]
    /// for replies this client cannot decode, and propagates call failures.
    pub fn node(&mut self, id: NodeId) -> Result<Node, ClientError> {
        self.lookup_node(&Node::lookup(id, ""))
    }

    /// Looks up a node by name.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty, oversized, or
    /// NUL-containing names, and otherwise fails like [`Session::node`].
    pub fn node_by_name(&mut self, name: &str) -> Result<Node, ClientError> {
        validate_name(name, MAX_NODE_NAME_LEN, "name")?;
        self.lookup_node(&Node::lookup(NodeId::ALL, name))
    }

    fn lookup_node(&mut self, request: &Node) -> Result<Node, ClientError> {
        let mut body = [0_u8; NODE_RECORD_LEN];
        let reply = self
            .begin_call(Command::GET_NODE, &request.encode(), &mut body)?
            .wait()?;
        reply.into_status()?;
        let malformed = ClientError::MalformedReply {
            command: Command::GET_NODE,
            expected: NODE_RECORD_LEN,
            actual: reply.body_len,
        };
        if reply.copied < NODE_RECORD_LEN {
            return Err(malformed);
        }
        check_record_size(Command::GET_NODE, &body)?;
        Node::decode(&body).ok_or(malformed)
    }

    /// Reads the cluster name, number, and membership generation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedReply`] when the reply body is too
    /// short, and propagates call failures.
    pub fn cluster(&mut self) -> Result<ClusterInfo, ClientError> {
        let mut body = [0_u8; CLUSTER_INFO_LEN];
        let reply = self
            .begin_call(Command::GET_CLUSTER, &[], &mut body)?
            .wait()?;
        reply.into_status()?;
        let malformed = ClientError::MalformedReply {
            command: Command::GET_CLUSTER,
            expected: CLUSTER_INFO_LEN,
            actual: reply.body_len,
        };
        if reply.copied < CLUSTER_INFO_LEN {
            return Err(malformed);
        }
        ClusterInfo::decode(&body).ok_or(malformed)
    }

    /// Returns true when the cluster software is running on this node.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn is_active(&mut self) -> Result<bool, ClientError> {
        self.status_call(Command::IS_ACTIVE, &[])
            .map(|status| status != 0)
    }

    /// Returns true when the cluster has quorum.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn is_quorate(&mut self) -> Result<bool, ClientError> {
        self.status_call(Command::IS_QUORATE, &[])
            .map(|status| status != 0)
    }

    /// Returns true when `node` has a listener bound to `port`.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn is_listening(&mut self, node: NodeId, port: u8) -> Result<bool, ClientError> {
        let mut request = [0_u8; 8];
        let (head, tail) = request.split_at_mut(4);
        head.copy_from_slice(&[port, 0, 0, 0]);
        tail.copy_from_slice(&encode_i32(node.get()));
        self.status_call(Command::IS_LISTENING, &request)
            .map(|status| status != 0)
    }

    /// Reads the protocol and configuration version.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MalformedReply`] when the reply body is too
    /// short, and propagates call failures.
    pub fn version(&mut self) -> Result<Version, ClientError> {
        let mut body = [0_u8; VERSION_LEN];
        let reply = self
            .begin_call(Command::GET_VERSION, &[], &mut body)?
            .wait()?;
        reply.into_status()?;
        let malformed = ClientError::MalformedReply {
            command: Command::GET_VERSION,
            expected: VERSION_LEN,
            actual: reply.body_len,
        };
        if reply.copied < VERSION_LEN {
            return Err(malformed);
        }
        Version::decode(&body).ok_or(malformed)
    }

    /// Updates the configuration version cluster-wide. Privileged.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn set_version(&mut self, version: Version) -> Result<(), ClientError> {
        self.status_call(Command::SET_VERSION, &version.encode())
            .map(drop)
    }

    /// Renames the local node. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty, oversized, or
    /// NUL-containing names.
    pub fn set_node_name(&mut self, name: &str) -> Result<(), ClientError> {
        validate_name(name, MAX_NODE_NAME_LEN, "name")?;
        self.string_call(Command::SET_NODE_NAME, name)
    }

    /// Adds a multicast address for cluster traffic. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty, oversized, or
    /// NUL-containing addresses.
    pub fn set_multicast_address(&mut self, address: &str) -> Result<(), ClientError> {
        validate_name(address, MAX_ADDRESS_LEN, "address")?;
        self.string_call(Command::ADD_MULTICAST, address)
    }

    /// Adds a local interface address for cluster traffic. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for empty, oversized, or
    /// NUL-containing addresses.
    pub fn set_interface_address(&mut self, address: &str) -> Result<(), ClientError> {
        validate_name(address, MAX_ADDRESS_LEN, "address")?;
        self.string_call(Command::ADD_INTERFACE, address)
    }

    /// Sends `value` NUL-terminated.
    fn string_call(&mut self, command: Command, value: &str) -> Result<(), ClientError> {
        let mut request = Vec::with_capacity(value.len() + 1);
        request.extend_from_slice(value.as_bytes());
        request.push(0);
        self.status_call(command, &request).map(drop)
    }

    /// Assigns the local node id. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for node id zero.
    pub fn set_node_id(&mut self, node: NodeId) -> Result<(), ClientError> {
        require_non_zero(node.get(), "node")?;
        self.status_call(Command::SET_NODE_ID, &encode_i32(node.get()))
            .map(drop)
    }

    /// Evicts `node` from the cluster. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for node id zero.
    pub fn kill_node(&mut self, node: NodeId) -> Result<(), ClientError> {
        require_non_zero(node.get(), "node")?;
        self.status_call(Command::KILL_NODE, &encode_i32(node.get()))
            .map(drop)
    }

    /// Changes the votes held by `node`; node zero means the local node.
    /// Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when `votes` is zero.
    pub fn set_votes(&mut self, votes: i32, node: NodeId) -> Result<(), ClientError> {
        require_non_zero(votes, "votes")?;
        let mut request = [0_u8; 8];
        let (head, tail) = request.split_at_mut(4);
        head.copy_from_slice(&encode_i32(node.get()));
        tail.copy_from_slice(&encode_i32(votes));
        self.status_call(Command::SET_VOTES, &request).map(drop)
    }

    /// Changes the expected vote count. Privileged.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when `votes` is zero.
    pub fn set_expected_votes(&mut self, votes: i32) -> Result<(), ClientError> {
        require_non_zero(votes, "votes")?;
        self.status_call(Command::SET_EXPECTED_VOTES, &encode_i32(votes))
            .map(drop)
    }

    /// Asks the local node to leave the cluster. Privileged.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub fn leave_cluster(&mut self, reason: i32) -> Result<(), ClientError> {
        self.status_call(Command::LEAVE_CLUSTER, &encode_i32(reason))
            .map(drop)
    }
}

fn check_record_size(command: Command, records: &[u8]) -> Result<(), ClientError> {
    let actual = record_size(records).unwrap_or_default();
    if actual == NODE_RECORD_LEN {
        Ok(())
    } else {
        Err(ClientError::RecordSize {
            command,
            expected: NODE_RECORD_LEN,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HEADER_LEN, MAX_FRAME_LEN, REPLY_PREAMBLE_LEN};

    #[test]
    fn node_reply_limit_fills_one_frame() {
        let room = MAX_FRAME_LEN as usize - HEADER_LEN - REPLY_PREAMBLE_LEN;
        assert!(MAX_NODES_PER_REPLY * NODE_RECORD_LEN <= room);
        assert!((MAX_NODES_PER_REPLY + 1) * NODE_RECORD_LEN > room);
    }

    #[test]
    fn foreign_record_size_is_rejected() {
        let mut record = Node::lookup(NodeId::new(1), "a").encode();
        record
            .get_mut(..4)
            .unwrap()
            .copy_from_slice(&encode_u32(400));
        let error = check_record_size(Command::GET_NODE, &record).unwrap_err();
        assert!(matches!(
            error,
            ClientError::RecordSize {
                expected: NODE_RECORD_LEN,
                actual: 400,
                ..
            }
        ));
    }

    #[test]
    fn version_encoding_is_four_words() {
        let version = Version {
            major: 5,
            minor: 0,
            patch: 1,
            config: 42,
        };
        let bytes = version.encode();
        assert_eq!(Version::decode(&bytes), Some(version));
        assert_eq!(read_u32(&bytes, 12), Some(42));
    }

    #[test]
    fn short_version_body_does_not_decode() {
        assert_eq!(Version::decode(&[0_u8; 12]), None);
    }

    #[test]
    fn version_display_includes_config() {
        let version = Version {
            major: 6,
            minor: 2,
            patch: 0,
            config: 7,
        };
        assert_eq!(version.to_string(), "6.2.0 (config 7)");
    }
}
