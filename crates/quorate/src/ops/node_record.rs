//! Node and cluster records carried in reply bodies.
//!
//! A node record is a fixed-size block:
//!
//! | offset | field                                  |
//! |--------|----------------------------------------|
//! | 0      | record size (u32)                      |
//! | 4      | node id (i32)                          |
//! | 8      | state (i32)                            |
//! | 12     | incarnation (u32)                      |
//! | 16     | join time, seconds since epoch (u64)   |
//! | 24     | name, NUL padded (256 bytes)           |
//! | 280    | socket address (128 bytes)             |
//!
//! The address block starts with a little-endian family word followed by the
//! port in network order, then the IPv4 address at offset 4 or the IPv6
//! address at offset 8.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::protocol::{
    NodeId, encode_i32, encode_u16, encode_u32, encode_u64, read_i32, read_u16, read_u32, read_u64,
};

/// Size of one node record.
pub const NODE_RECORD_LEN: usize = 408;

/// Size of the cluster description returned by [`Session::cluster`](crate::Session::cluster).
pub(crate) const CLUSTER_INFO_LEN: usize = 24;

/// Longest cluster name reported by the daemon.
const MAX_CLUSTER_NAME_LEN: usize = 16;

const ID_OFFSET: usize = 4;
const STATE_OFFSET: usize = 8;
const INCARNATION_OFFSET: usize = 12;
const JOIN_TIME_OFFSET: usize = 16;
const NAME_OFFSET: usize = 24;
const NAME_FIELD_LEN: usize = 256;
const ADDRESS_OFFSET: usize = NAME_OFFSET + NAME_FIELD_LEN;
const ADDRESS_FIELD_LEN: usize = 128;

const STATE_MEMBER: i32 = 2;

const FAMILY_INET: u16 = 2;
const FAMILY_INET6: u16 = 10;

const CLUSTER_NUMBER_OFFSET: usize = 18;
const CLUSTER_GENERATION_OFFSET: usize = 20;

/// One cluster node as reported by the daemon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Node identifier.
    pub id: NodeId,
    /// Returns true while the node is a full cluster member.
    pub member: bool,
    /// Node name.
    pub name: String,
    /// Number of times the node has joined.
    pub incarnation: u32,
    /// When the node last joined, in seconds since the Unix epoch.
    pub join_time: u64,
    /// Cluster address, when the record carries an IPv4 or IPv6 one.
    pub address: Option<SocketAddr>,
}

impl Node {
    /// Record asking the daemon to look up `id`, or `name` when `id` is zero.
    pub(crate) fn lookup(id: NodeId, name: &str) -> Self {
        Self {
            id,
            member: false,
            name: name.to_owned(),
            incarnation: 0,
            join_time: 0,
            address: None,
        }
    }

    /// Encodes the node as one wire record, size word included.
    ///
    /// Names longer than 255 bytes are truncated.
    #[must_use]
    pub fn encode(&self) -> [u8; NODE_RECORD_LEN] {
        let mut record = [0_u8; NODE_RECORD_LEN];
        let size = u32::try_from(NODE_RECORD_LEN).unwrap_or(u32::MAX);
        let state = if self.member { STATE_MEMBER } else { 0 };
        put(&mut record, 0, &encode_u32(size));
        put(&mut record, ID_OFFSET, &encode_i32(self.id.get()));
        put(&mut record, STATE_OFFSET, &encode_i32(state));
        put(&mut record, INCARNATION_OFFSET, &encode_u32(self.incarnation));
        put(&mut record, JOIN_TIME_OFFSET, &encode_u64(self.join_time));
        let name = self.name.as_bytes();
        put(
            &mut record,
            NAME_OFFSET,
            name.get(..NAME_FIELD_LEN - 1).unwrap_or(name),
        );
        if let Some(address) = self.address {
            put(&mut record, ADDRESS_OFFSET, &encode_address(address));
        }
        record
    }

    /// Decodes one record, ignoring its size word.
    pub(crate) fn decode(record: &[u8]) -> Option<Self> {
        let name = record.get(NAME_OFFSET..ADDRESS_OFFSET)?;
        let address = record.get(ADDRESS_OFFSET..ADDRESS_OFFSET + ADDRESS_FIELD_LEN)?;
        Some(Self {
            id: NodeId::new(read_i32(record, ID_OFFSET)?),
            member: read_i32(record, STATE_OFFSET)? == STATE_MEMBER,
            name: nul_terminated(name),
            incarnation: read_u32(record, INCARNATION_OFFSET)?,
            join_time: read_u64(record, JOIN_TIME_OFFSET)?,
            address: decode_address(address),
        })
    }
}

/// Size word announced by the first record of a body.
pub(crate) fn record_size(body: &[u8]) -> Option<usize> {
    read_u32(body, 0).and_then(|size| usize::try_from(size).ok())
}

/// Cluster identity reported by the daemon.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Cluster name.
    pub name: String,
    /// Cluster number.
    pub number: u16,
    /// Membership generation, bumped on every transition.
    pub generation: u32,
}

impl ClusterInfo {
    pub(crate) fn decode(body: &[u8]) -> Option<Self> {
        Some(Self {
            name: nul_terminated(body.get(..=MAX_CLUSTER_NAME_LEN)?),
            number: read_u16(body, CLUSTER_NUMBER_OFFSET)?,
            generation: read_u32(body, CLUSTER_GENERATION_OFFSET)?,
        })
    }
}

fn put(record: &mut [u8], offset: usize, bytes: &[u8]) {
    if let Some(field) = record.get_mut(offset..offset + bytes.len()) {
        field.copy_from_slice(bytes);
    }
}

fn nul_terminated(field: &[u8]) -> String {
    let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
    String::from_utf8_lossy(field.get(..end).unwrap_or_default()).into_owned()
}

#[expect(
    clippy::big_endian_bytes,
    reason = "socket address ports are carried in network byte order"
)]
fn decode_address(field: &[u8]) -> Option<SocketAddr> {
    let port = u16::from_be_bytes(field.get(2..4)?.try_into().ok()?);
    let ip = match read_u16(field, 0)? {
        FAMILY_INET => {
            let octets: [u8; 4] = field.get(4..8)?.try_into().ok()?;
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        FAMILY_INET6 => {
            let octets: [u8; 16] = field.get(8..24)?.try_into().ok()?;
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}

#[expect(
    clippy::big_endian_bytes,
    reason = "socket address ports are carried in network byte order"
)]
fn encode_address(address: SocketAddr) -> [u8; ADDRESS_FIELD_LEN] {
    let mut field = [0_u8; ADDRESS_FIELD_LEN];
    put(&mut field, 2, &address.port().to_be_bytes());
    match address.ip() {
        IpAddr::V4(ip) => {
            put(&mut field, 0, &encode_u16(FAMILY_INET));
            put(&mut field, 4, &ip.octets());
        }
        IpAddr::V6(ip) => {
            put(&mut field, 0, &encode_u16(FAMILY_INET6));
            put(&mut field, 8, &ip.octets());
        }
    }
    field
}

#[cfg(test)]
pub(crate) fn encode_cluster_info(info: &ClusterInfo) -> [u8; CLUSTER_INFO_LEN] {
    let mut body = [0_u8; CLUSTER_INFO_LEN];
    put(&mut body, 0, info.name.as_bytes());
    put(&mut body, CLUSTER_NUMBER_OFFSET, &encode_u16(info.number));
    put(&mut body, CLUSTER_GENERATION_OFFSET, &encode_u32(info.generation));
    body
}
