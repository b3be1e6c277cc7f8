//! # torus-dht
//!
//! Ring-membership state and control-protocol logic for a torus node.
//!
//! This crate implements:
//! - The [`node::Node`] record: local identity, predecessor and successor
//!   neighbors, and membership status.
//! - The bounded [`cache::LookupCache`] that bridges asynchronous lookup
//!   replies to synchronous HTTP request handling.
//! - The [`protocol`] handler mapping one inbound control packet to at most
//!   one outbound packet plus local state mutation.
//!
//! ## Key Parameters
//!
//! | Parameter | Value |
//! |---|---|
//! | Identifier space | 16-bit ring (2^16 positions) |
//! | Lookup cache slots | 10 |
//! | Cache eviction | overwrite slot 0 when full |
//!
//! All logic here is synchronous and single-threaded; the event loop owns
//! every value in this crate and I/O stays with the caller.

pub mod cache;
pub mod node;
pub mod protocol;

pub use cache::LookupCache;
pub use node::{MembershipStatus, Node};
pub use protocol::{handle_packet, Outbound};

/// Number of slots in the lookup cache.
pub const LOOKUP_CACHE_SLOTS: usize = 10;
