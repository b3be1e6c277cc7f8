//! Integration test: HTTP routing against a live ring view.
//!
//! Exercises the try-locally-or-redirect decision and the asynchronous
//! lookup path end to end, without sockets:
//! 1. A request for a hash in the node's own arc is served from the store.
//! 2. A request for the successor's arc is answered with a redirect.
//! 3. A request for a foreign arc yields `503 Retry-After: 1` plus a
//!    `Lookup`; the lookup travels the ring, the `Reply` resolves the
//!    cache, and the client's retry is redirected to the owner.
//!
//! The ring is A (0x2000) → B (0x8000) → C (0xE000); the URI hashes used
//! here place `/static/foo` and `/dynamic/a` in C's arc and `/static/bar`
//! in B's.

use std::net::Ipv4Addr;

use torus_dht::{handle_packet, Node};
use torus_http::codec::{Method, Request};
use torus_http::routing::{route, uri_hash};
use torus_store::{MemoryStore, ObjectStore};
use torus_types::Responsibility;
use torus_wire::PacketKind;

fn make_node(id: u16) -> Node {
    Node::new(id, Ipv4Addr::new(10, 0, 0, (id >> 12) as u8 + 1), 4000 + (id >> 12))
}

fn make_ring() -> (Node, Node, Node) {
    let mut a = make_node(0x2000);
    let mut b = make_node(0x8000);
    let mut c = make_node(0xE000);

    a.pred = Some(c.self_neighbor());
    a.succ = Some(b.self_neighbor());
    b.pred = Some(a.self_neighbor());
    b.succ = Some(c.self_neighbor());
    c.pred = Some(b.self_neighbor());
    c.succ = Some(a.self_neighbor());

    (a, b, c)
}

fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new(100);
    store.make_dir("/static").expect("mkdir");
    store.make_dir("/dynamic").expect("mkdir");
    store.write("/static/foo", b"Foo").expect("seed");
    store.write("/static/bar", b"Bar").expect("seed");
    store
}

fn request(method: Method, uri: &str, body: &[u8]) -> Request {
    Request {
        method,
        uri: uri.to_string(),
        headers: Vec::new(),
        body: body.to_vec(),
    }
}

#[test]
fn owner_serves_from_its_store() {
    let (_a, _b, mut c) = make_ring();
    let mut store = seeded_store();

    // `/static/foo` hashes into C's arc (0x8000, 0xE000].
    assert_eq!(
        c.responsibility(uri_hash("/static/foo")),
        Responsibility::Local
    );

    let routed = route(&request(Method::Get, "/static/foo", b""), Some(&mut c), &mut store);
    assert_eq!(routed.response.status(), 200);
    assert!(routed.lookup.is_none());
}

#[test]
fn successor_arc_is_redirected_without_a_lookup() {
    let (_a, mut b, c) = make_ring();
    let mut store = seeded_store();

    let routed = route(&request(Method::Get, "/static/foo", b""), Some(&mut b), &mut store);
    assert_eq!(routed.response.status(), 303);
    let location = routed.response.header("Location").expect("location");
    assert_eq!(
        location,
        format!(
            "http://{}:{}/static/foo",
            c.self_neighbor().host,
            c.self_neighbor().port
        )
    );
    assert!(routed.lookup.is_none());
}

#[test]
fn foreign_arc_resolves_through_the_ring() {
    let (mut a, mut b, c) = make_ring();
    let mut store = seeded_store();

    // =========================================================
    // Step 1: the first request misses and starts a lookup.
    // =========================================================
    let routed = route(&request(Method::Get, "/static/foo", b""), Some(&mut a), &mut store);
    assert_eq!(routed.response.status(), 503);
    assert_eq!(routed.response.header("Retry-After"), Some("1"));

    let out = routed.lookup.expect("a lookup goes out");
    assert_eq!(out.packet.kind, PacketKind::Lookup);
    assert_eq!(out.dest, b.self_neighbor().endpoint(), "sent to A's successor");

    // =========================================================
    // Step 2: B answers the lookup on behalf of its successor C.
    // =========================================================
    let reply = handle_packet(&mut b, out.packet).expect("B replies");
    assert_eq!(reply.packet.kind, PacketKind::Reply);
    assert_eq!(reply.dest, a.self_neighbor().endpoint(), "straight back to A");
    assert_eq!(reply.packet.described_node(), c.self_neighbor());

    // =========================================================
    // Step 3: the reply resolves A's pending slot.
    // =========================================================
    assert_eq!(handle_packet(&mut a, reply.packet), None);

    // =========================================================
    // Step 4: the client's retry is redirected to the owner C.
    // =========================================================
    let routed = route(&request(Method::Get, "/static/foo", b""), Some(&mut a), &mut store);
    assert_eq!(routed.response.status(), 303);
    let location = routed.response.header("Location").expect("location");
    assert_eq!(
        location,
        format!(
            "http://{}:{}/static/foo",
            c.self_neighbor().host,
            c.self_neighbor().port
        )
    );
    assert!(routed.lookup.is_none(), "no further lookup needed");
}

#[test]
fn put_follows_the_redirect_chain_to_the_owner() {
    let (mut a, mut b, mut c) = make_ring();
    let mut store_a = seeded_store();
    let mut store_c = seeded_store();

    let put = request(Method::Put, "/dynamic/a", b"payload");

    // A cannot place `/dynamic/a` and starts a lookup.
    let routed = route(&put, Some(&mut a), &mut store_a);
    assert_eq!(routed.response.status(), 503);
    let out = routed.lookup.expect("lookup");

    // Ring resolves the owner...
    let reply = handle_packet(&mut b, out.packet).expect("B replies");
    handle_packet(&mut a, reply.packet);

    // ...the retry is redirected to C...
    let routed = route(&put, Some(&mut a), &mut store_a);
    assert_eq!(routed.response.status(), 303);

    // ...and C accepts the write.
    let routed = route(&put, Some(&mut c), &mut store_c);
    assert_eq!(routed.response.status(), 201);
    assert_eq!(store_c.read("/dynamic/a").expect("read"), b"payload");
    assert!(!store_a.exists("/dynamic/a"), "nothing was written at A");
}

#[test]
fn wrap_around_arcs_route_correctly() {
    let mut node = make_node(0x0100);
    node.pred = Some(make_node(0xFF00).self_neighbor());
    node.succ = Some(make_node(0x0200).self_neighbor());

    assert_eq!(node.responsibility(0xFFC0), Responsibility::Local);
    assert_eq!(node.responsibility(0x0180), Responsibility::Successor);
    assert_eq!(node.responsibility(0x0500), Responsibility::Neither);
}
