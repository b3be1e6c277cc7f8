//! # torus-wire
//!
//! Codec for the torus UDP control protocol. Every control message is a
//! fixed-size 11-byte packet; see [`packet`] for the wire layout.
//!
//! The codec does no I/O, and it is the only place where packet kinds are
//! converted to and from their numeric wire form.

pub mod packet;

pub use packet::{Packet, PacketKind, PACKET_LEN};

/// Error types for wire encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The buffer is not exactly one packet long.
    #[error("invalid packet length: {len} bytes, expected {PACKET_LEN}")]
    InvalidLength { len: usize },

    /// The kind byte does not name a known packet kind.
    #[error("unknown packet kind: {0:#04x}")]
    UnknownKind(u8),
}

/// Convenience result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
