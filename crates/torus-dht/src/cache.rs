//! The lookup cache: recently queried hashes and the neighbors that
//! answered for them.
//!
//! The HTTP shim cannot wait for a lookup to resolve, so it records the
//! queried hash as a *pending* slot and answers the client with a retry
//! hint. When the matching reply arrives, the protocol handler attaches the
//! answering neighbor to the first pending slot, turning it *resolved*; the
//! client's retry then finds the mapping and is redirected.
//!
//! ## Eviction
//!
//! The cache holds a fixed number of slots. A new pending hash takes the
//! lowest empty slot; when no slot is empty, slot 0 is overwritten. The
//! policy is deterministic and approximates oldest-first.

use torus_types::Neighbor;

/// One cache slot.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Slot {
    /// Nothing recorded.
    Empty,
    /// A lookup was sent for `hash`; no reply yet.
    Pending { hash: u16 },
    /// `neighbor` answered for `hash`.
    Resolved { hash: u16, neighbor: Neighbor },
}

/// Bounded map from recently queried hashes to answering neighbors.
///
/// Not thread-safe; the event loop holds exclusive access.
#[derive(Clone, Debug)]
pub struct LookupCache {
    slots: Vec<Slot>,
}

impl LookupCache {
    /// Create a cache with `slots` slots, all empty.
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; slots],
        }
    }

    /// Record `hash` as pending in the lowest empty slot, evicting slot 0
    /// when the cache is full. Returns the index of the slot used.
    pub fn add_pending(&mut self, hash: u16) -> usize {
        let index = match self.slots.iter().position(|s| *s == Slot::Empty) {
            Some(i) => i,
            None => {
                tracing::debug!(hash, "Lookup cache full, evicting slot 0");
                0
            }
        };
        self.slots[index] = Slot::Pending { hash };
        index
    }

    /// The lowest index holding a pending hash, if any.
    pub fn find_pending(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Slot::Pending { .. }))
    }

    /// Attach `neighbor` to the pending slot at `index`, making it resolved.
    ///
    /// Returns `false` (and changes nothing) if the slot does not currently
    /// hold a pending hash.
    pub fn resolve(&mut self, index: usize, neighbor: Neighbor) -> bool {
        match self.slots.get(index) {
            Some(Slot::Pending { hash }) => {
                let hash = *hash;
                self.slots[index] = Slot::Resolved { hash, neighbor };
                true
            }
            _ => false,
        }
    }

    /// The neighbor that answered for `hash`, if a resolved slot matches.
    ///
    /// Scans from the highest index down so that the most recently written
    /// mapping wins when a hash occurs more than once.
    pub fn lookup(&self, hash: u16) -> Option<&Neighbor> {
        self.slots.iter().rev().find_map(|s| match s {
            Slot::Resolved {
                hash: h, neighbor, ..
            } if *h == hash => Some(neighbor),
            _ => None,
        })
    }
}
