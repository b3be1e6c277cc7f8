//! Control-packet layout and codec.
//!
//! ## Wire format
//!
//! 11 bytes, network byte order where applicable:
//!
//! | Offset | Size | Field     | Encoding              |
//! |--------|------|-----------|-----------------------|
//! | 0      | 1    | kind      | raw byte              |
//! | 1      | 2    | hash      | big-endian u16        |
//! | 3      | 2    | node_id   | big-endian u16        |
//! | 5      | 4    | node_ip   | IPv4 in network order |
//! | 9      | 2    | node_port | big-endian u16        |
//!
//! The `node_*` fields always describe one node — which node depends on the
//! kind: the querying node for `Lookup`, the answered neighbor for `Reply`,
//! the sender for `Stabilize` and `Join`, and the carried (to-be-installed)
//! successor for `Notify`.

use std::net::Ipv4Addr;

use torus_types::Neighbor;

use crate::{Result, WireError};

/// Size of every control packet on the wire.
pub const PACKET_LEN: usize = 11;

/// The kind of a control packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    /// Who is responsible for a hash? Answered with a [`PacketKind::Reply`].
    Lookup,
    /// Answer to a `Lookup`, carrying the responsible neighbor.
    Reply,
    /// Periodic successor refresh; answered with a [`PacketKind::Notify`].
    Stabilize,
    /// Carries the identity the receiver should adopt as its successor.
    Notify,
    /// A new node asking to be absorbed into the ring.
    Join,
}

impl PacketKind {
    /// The numeric wire form of this kind.
    pub fn to_wire(self) -> u8 {
        match self {
            PacketKind::Lookup => 0,
            PacketKind::Reply => 1,
            PacketKind::Stabilize => 2,
            PacketKind::Notify => 3,
            PacketKind::Join => 4,
        }
    }

    /// Parse a kind byte. Returns `None` for bytes above the known range.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PacketKind::Lookup),
            1 => Some(PacketKind::Reply),
            2 => Some(PacketKind::Stabilize),
            3 => Some(PacketKind::Notify),
            4 => Some(PacketKind::Join),
            _ => None,
        }
    }
}

/// One UDP control packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// What this packet asks for or announces.
    pub kind: PacketKind,
    /// The ring position the packet is about (0 where the kind has no use
    /// for it).
    pub hash: u16,
    /// Ring identifier of the described node.
    pub node_id: u16,
    /// IPv4 address of the described node.
    pub node_ip: Ipv4Addr,
    /// Port of the described node.
    pub node_port: u16,
}

impl Packet {
    /// A lookup for `hash`, stamped with the querying node's identity so
    /// the responsible node can answer it directly.
    pub fn lookup(hash: u16, origin: &Neighbor) -> Self {
        Self::with_neighbor(PacketKind::Lookup, hash, origin)
    }

    /// The answer to a lookup: `answer` is responsible for `hash`.
    pub fn reply(hash: u16, answer: &Neighbor) -> Self {
        Self::with_neighbor(PacketKind::Reply, hash, answer)
    }

    /// A stabilize probe from `sender`. The hash field carries the sender's
    /// own identifier.
    pub fn stabilize(sender: &Neighbor) -> Self {
        Self::with_neighbor(PacketKind::Stabilize, sender.id, sender)
    }

    /// A notify carrying the identity the receiver should take as its
    /// successor.
    pub fn notify(carried: &Neighbor) -> Self {
        Self::with_neighbor(PacketKind::Notify, 0, carried)
    }

    /// A join request from `joiner`.
    pub fn join(joiner: &Neighbor) -> Self {
        Self::with_neighbor(PacketKind::Join, 0, joiner)
    }

    fn with_neighbor(kind: PacketKind, hash: u16, n: &Neighbor) -> Self {
        Self {
            kind,
            hash,
            node_id: n.id,
            node_ip: n.host,
            node_port: n.port,
        }
    }

    /// The node described by the `node_*` fields, as a neighbor record.
    pub fn described_node(&self) -> Neighbor {
        Neighbor::new(self.node_id, self.node_ip, self.node_port)
    }

    /// Encode to the fixed wire layout.
    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0] = self.kind.to_wire();
        buf[1..3].copy_from_slice(&self.hash.to_be_bytes());
        buf[3..5].copy_from_slice(&self.node_id.to_be_bytes());
        buf[5..9].copy_from_slice(&self.node_ip.octets());
        buf[9..11].copy_from_slice(&self.node_port.to_be_bytes());
        buf
    }

    /// Decode a packet from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidLength`] unless the buffer is exactly
    /// [`PACKET_LEN`] bytes, and [`WireError::UnknownKind`] for a kind byte
    /// outside the known range.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PACKET_LEN {
            return Err(WireError::InvalidLength { len: bytes.len() });
        }

        let kind = PacketKind::from_wire(bytes[0]).ok_or(WireError::UnknownKind(bytes[0]))?;

        Ok(Self {
            kind,
            hash: u16::from_be_bytes([bytes[1], bytes[2]]),
            node_id: u16::from_be_bytes([bytes[3], bytes[4]]),
            node_ip: Ipv4Addr::new(bytes[5], bytes[6], bytes[7], bytes[8]),
            node_port: u16::from_be_bytes([bytes[9], bytes[10]]),
        })
    }
}
