//! # torus-types
//!
//! Shared value types for the torus ring network: 16-bit ring identifiers,
//! the responsibility predicate, and the [`Neighbor`] record describing a
//! remote node.
//!
//! Everything in this crate is pure data and pure functions; no I/O.

pub mod neighbor;
pub mod ring;

pub use neighbor::Neighbor;
pub use ring::{responsibility, Responsibility};

/// A position on the identifier ring, taken modulo 2^16.
pub type RingId = u16;
