//! Local node state: identity, neighbors, and membership status.

use std::net::Ipv4Addr;

use tracing::info;

use torus_types::{ring, Neighbor, Responsibility};

use crate::cache::LookupCache;
use crate::LOOKUP_CACHE_SLOTS;

/// Where the node stands in the ring-membership lifecycle.
///
/// `Joining` and `Stabilizing` each ask the event loop to emit one control
/// packet on its next tick; emitting it returns the status to `Ok`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipStatus {
    /// Fresh node with a configured anchor; a `Join` is owed to the anchor.
    Joining,
    /// The periodic timer fired; a `Stabilize` is owed to the successor.
    Stabilizing,
    /// Steady state.
    Ok,
}

/// The local node's complete DHT state.
///
/// Neighbor records are values: replacing a neighbor installs a new record
/// and drops the old one. `None` means the neighbor is not yet known.
#[derive(Clone, Debug)]
pub struct Node {
    /// The local ring identifier.
    pub id: u16,
    /// The address this node serves on (TCP and UDP).
    pub host: Ipv4Addr,
    /// The port this node serves on.
    pub port: u16,
    /// The predecessor, owner of the arc ending where ours begins.
    pub pred: Option<Neighbor>,
    /// The successor, owner of the arc starting where ours ends.
    pub succ: Option<Neighbor>,
    /// Membership lifecycle status.
    pub status: MembershipStatus,
    /// Answers learned from recent lookups.
    pub cache: LookupCache,
}

impl Node {
    /// Create a node. Status starts `Ok`; a joining node is switched to
    /// [`MembershipStatus::Joining`] by the bootstrap code once an anchor
    /// is known.
    pub fn new(id: u16, host: Ipv4Addr, port: u16) -> Self {
        Self {
            id,
            host,
            port,
            pred: None,
            succ: None,
            status: MembershipStatus::Ok,
            cache: LookupCache::new(LOOKUP_CACHE_SLOTS),
        }
    }

    /// The local node described as a neighbor record, for stamping into
    /// outbound packets.
    pub fn self_neighbor(&self) -> Neighbor {
        Neighbor::new(self.id, self.host, self.port)
    }

    /// Whether this node knows no other ring member.
    pub fn is_alone(&self) -> bool {
        self.pred.is_none() && self.succ.is_none()
    }

    /// Responsibility for `hash` from this node's point of view.
    ///
    /// With both neighbors known this is the plain arc test. While a
    /// neighbor is still missing (transient bootstrap states) the missing
    /// bound collapses onto the known one, so the two known members split
    /// the whole ring between them; with no neighbors at all the node owns
    /// everything.
    pub fn responsibility(&self, hash: u16) -> Responsibility {
        let pred_id = self.pred.as_ref().map(|n| n.id);
        let succ_id = self.succ.as_ref().map(|n| n.id);
        match (pred_id, succ_id) {
            (Some(p), Some(s)) => ring::responsibility(p, self.id, s, hash),
            (None, Some(s)) => ring::responsibility(s, self.id, s, hash),
            (Some(p), None) => ring::responsibility(p, self.id, p, hash),
            (None, None) => Responsibility::Local,
        }
    }

    /// Install `n` as the predecessor, dropping any previous record.
    pub fn adopt_pred(&mut self, n: Neighbor) {
        info!(pred = %n, "Adopting predecessor");
        self.pred = Some(n);
    }

    /// Install `n` as the successor, dropping any previous record.
    pub fn adopt_succ(&mut self, n: Neighbor) {
        info!(succ = %n, "Adopting successor");
        self.succ = Some(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(id: u16) -> Neighbor {
        Neighbor::new(id, Ipv4Addr::new(10, 0, 0, 1), 4000)
    }

    fn node_with(pred: Option<u16>, succ: Option<u16>) -> Node {
        let mut node = Node::new(0x4000, Ipv4Addr::new(127, 0, 0, 1), 8080);
        node.pred = pred.map(neighbor);
        node.succ = succ.map(neighbor);
        node
    }

    #[test]
    fn test_full_ring_view() {
        let node = node_with(Some(0x0000), Some(0x8000));
        assert_eq!(node.responsibility(0x1234), Responsibility::Local);
        assert_eq!(node.responsibility(0x5678), Responsibility::Successor);
        assert_eq!(node.responsibility(0xC000), Responsibility::Neither);
    }

    #[test]
    fn test_alone_owns_everything() {
        let node = node_with(None, None);
        assert!(node.is_alone());
        for hash in [0x0000, 0x4000, 0xFFFF] {
            assert_eq!(node.responsibility(hash), Responsibility::Local);
        }
    }

    #[test]
    fn test_missing_pred_splits_ring_with_succ() {
        let node = node_with(None, Some(0x8000));
        // Two known members: (succ, self] is ours, (self, succ] is theirs.
        assert_eq!(node.responsibility(0x9000), Responsibility::Local);
        assert_eq!(node.responsibility(0x4000), Responsibility::Local);
        assert_eq!(node.responsibility(0x5000), Responsibility::Successor);
        assert_eq!(node.responsibility(0x8000), Responsibility::Successor);
    }

    #[test]
    fn test_missing_succ_splits_ring_with_pred() {
        let node = node_with(Some(0x0000), None);
        assert_eq!(node.responsibility(0x1234), Responsibility::Local);
        assert_eq!(node.responsibility(0x9000), Responsibility::Successor);
    }

    #[test]
    fn test_adopt_replaces_whole_record() {
        let mut node = node_with(Some(0x1000), Some(0x8000));
        let replacement = Neighbor::new(0x2000, Ipv4Addr::new(10, 0, 0, 9), 4009);
        node.adopt_pred(replacement.clone());
        assert_eq!(node.pred, Some(replacement));

        let replacement = Neighbor::new(0x9000, Ipv4Addr::new(10, 0, 0, 8), 4008);
        node.adopt_succ(replacement.clone());
        assert_eq!(node.succ, Some(replacement));
    }

    #[test]
    fn test_self_neighbor() {
        let node = node_with(None, None);
        let me = node.self_neighbor();
        assert_eq!((me.id, me.host, me.port), (node.id, node.host, node.port));
    }
}
