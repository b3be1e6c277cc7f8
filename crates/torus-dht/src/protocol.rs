//! The UDP control-protocol handler.
//!
//! [`handle_packet`] consumes one decoded inbound packet, mutates the node
//! where the protocol says so, and returns at most one packet to send. All
//! socket I/O stays with the caller.
//!
//! Dispatch, by kind and responsibility for the packet's subject position
//! (the queried hash for `Lookup`, the joiner's identifier for `Join`):
//!
//! | kind      | responsibility | action |
//! |-----------|----------------|--------|
//! | Lookup    | Local          | Reply with self, to the querying node |
//! | Lookup    | Successor      | Reply with succ, to the querying node |
//! | Lookup    | Neither        | Forward unchanged to succ |
//! | Join      | Local          | Absorb joiner as pred (and succ if none); Notify joiner with self |
//! | Join      | otherwise      | Forward unchanged to succ |
//! | Stabilize | any            | Adopt sender as pred if pred unknown; Notify sender with current pred |
//! | Notify    | any            | Replace succ with the carried identity, unless it is self |
//! | Reply     | any            | Resolve the first pending cache slot; no reply |

use std::net::SocketAddrV4;

use tracing::{debug, warn};

use torus_types::Responsibility;
use torus_wire::{Packet, PacketKind};

use crate::node::Node;

/// A packet the caller should put on the wire, and where to send it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    /// The packet to send.
    pub packet: Packet,
    /// Destination endpoint.
    pub dest: SocketAddrV4,
}

/// Process one inbound control packet against the node.
///
/// Returns the packet to send in response, if the protocol calls for one.
pub fn handle_packet(node: &mut Node, pkt: Packet) -> Option<Outbound> {
    match pkt.kind {
        PacketKind::Lookup => handle_lookup(node, pkt),
        PacketKind::Reply => handle_reply(node, pkt),
        PacketKind::Stabilize => handle_stabilize(node, pkt),
        PacketKind::Notify => handle_notify(node, pkt),
        PacketKind::Join => handle_join(node, pkt),
    }
}

fn handle_lookup(node: &mut Node, pkt: Packet) -> Option<Outbound> {
    let requester = pkt.described_node();
    match node.responsibility(pkt.hash) {
        Responsibility::Local => {
            debug!(hash = pkt.hash, to = %requester, "Answering lookup with self");
            Some(Outbound {
                packet: Packet::reply(pkt.hash, &node.self_neighbor()),
                dest: requester.endpoint(),
            })
        }
        Responsibility::Successor => {
            let succ = node.succ.clone()?;
            debug!(hash = pkt.hash, to = %requester, "Answering lookup with successor");
            Some(Outbound {
                packet: Packet::reply(pkt.hash, &succ),
                dest: requester.endpoint(),
            })
        }
        Responsibility::Neither => forward_to_succ(node, pkt),
    }
}

fn handle_reply(node: &mut Node, pkt: Packet) -> Option<Outbound> {
    let answer = pkt.described_node();
    match node.cache.find_pending() {
        Some(index) => {
            debug!(slot = index, neighbor = %answer, "Lookup resolved");
            node.cache.resolve(index, answer);
        }
        None => debug!(neighbor = %answer, "Reply with no pending lookup, dropping"),
    }
    None
}

fn handle_stabilize(node: &mut Node, pkt: Packet) -> Option<Outbound> {
    let sender = pkt.described_node();
    if node.pred.is_none() {
        node.adopt_pred(sender.clone());
    }

    // pred is present from here on; tell the sender who we believe sits
    // directly before us so it can fix its successor pointer.
    let pred = node.pred.clone()?;
    Some(Outbound {
        packet: Packet::notify(&pred),
        dest: sender.endpoint(),
    })
}

fn handle_notify(node: &mut Node, pkt: Packet) -> Option<Outbound> {
    let carried = pkt.described_node();
    if carried == node.self_neighbor() {
        return None;
    }
    if node.succ.as_ref() != Some(&carried) {
        node.adopt_succ(carried);
    }
    None
}

fn handle_join(node: &mut Node, pkt: Packet) -> Option<Outbound> {
    let joiner = pkt.described_node();
    if joiner == node.self_neighbor() {
        debug!("Join from self, dropping");
        return None;
    }

    match node.responsibility(joiner.id) {
        Responsibility::Local => {
            node.adopt_pred(joiner.clone());
            if node.succ.is_none() {
                node.adopt_succ(joiner.clone());
            }
            Some(Outbound {
                packet: Packet::notify(&node.self_neighbor()),
                dest: joiner.endpoint(),
            })
        }
        // A join meant for the successor is forwarded one hop further so
        // the successor absorbs the joiner as its predecessor.
        Responsibility::Successor | Responsibility::Neither => forward_to_succ(node, pkt),
    }
}

fn forward_to_succ(node: &Node, pkt: Packet) -> Option<Outbound> {
    match &node.succ {
        Some(succ) => {
            debug!(kind = ?pkt.kind, to = %succ, "Forwarding to successor");
            Some(Outbound {
                dest: succ.endpoint(),
                packet: pkt,
            })
        }
        None => {
            warn!(kind = ?pkt.kind, "Cannot forward without a successor, dropping");
            None
        }
    }
}
