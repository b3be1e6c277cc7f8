//! The routing shim: decide, per request, between serving locally,
//! redirecting to the successor, and starting an asynchronous lookup.
//!
//! The shim never blocks waiting for a lookup reply. A miss answers
//! `503 Service Unavailable` with `Retry-After: 1` and leaves a pending
//! cache slot behind; the reply arrives through the UDP handler and the
//! client's retry finds the resolved mapping.

use sha2::{Digest, Sha256};
use tracing::debug;

use torus_dht::{Node, Outbound};
use torus_store::{ObjectStore, StoreError, WriteOutcome};
use torus_types::{Neighbor, Responsibility};
use torus_wire::Packet;

use crate::codec::{Method, Request, Response};

/// The ring position of a URI: the first two bytes, big-endian, of the
/// SHA-256 digest of the ASCII path.
pub fn uri_hash(uri: &str) -> u16 {
    let digest = Sha256::digest(uri.as_bytes());
    u16::from_be_bytes([digest[0], digest[1]])
}

/// The outcome of routing one request.
#[derive(Debug)]
pub struct Routed {
    /// The response to write back to the client.
    pub response: Response,
    /// A lookup packet to put on the wire, when the shim started one.
    pub lookup: Option<Outbound>,
}

impl Routed {
    fn local(response: Response) -> Self {
        Self {
            response,
            lookup: None,
        }
    }
}

/// Route one parsed request.
///
/// `node` is `None` when the server does not participate in a ring (plain
/// web-server mode); every request is then served from the local store.
pub fn route(req: &Request, node: Option<&mut Node>, store: &mut dyn ObjectStore) -> Routed {
    let Some(node) = node else {
        return Routed::local(serve(req, store));
    };

    let hash = uri_hash(&req.uri);
    match node.responsibility(hash) {
        Responsibility::Local => Routed::local(serve(req, store)),
        Responsibility::Successor => match node.succ.clone() {
            Some(succ) => {
                debug!(uri = %req.uri, hash, to = %succ, "Redirecting to successor");
                Routed::local(redirect(&succ, &req.uri))
            }
            None => Routed::local(serve(req, store)),
        },
        Responsibility::Neither => {
            if let Some(answer) = node.cache.lookup(hash) {
                debug!(uri = %req.uri, hash, to = %answer, "Redirecting to cached answer");
                return Routed::local(redirect(&answer.clone(), &req.uri));
            }
            match node.succ.clone() {
                Some(succ) => {
                    node.cache.add_pending(hash);
                    debug!(uri = %req.uri, hash, via = %succ, "Starting ring lookup");
                    Routed {
                        response: Response::new(503).with_header("Retry-After", "1"),
                        lookup: Some(Outbound {
                            packet: Packet::lookup(hash, &node.self_neighbor()),
                            dest: succ.endpoint(),
                        }),
                    }
                }
                None => Routed::local(serve(req, store)),
            }
        }
    }
}

/// A `303 See Other` pointing the client at `to` for the same URI.
fn redirect(to: &Neighbor, uri: &str) -> Response {
    Response::new(303).with_header("Location", &format!("http://{}:{}{}", to.host, to.port, uri))
}

/// Serve the request from the local store.
fn serve(req: &Request, store: &mut dyn ObjectStore) -> Response {
    match &req.method {
        Method::Get => serve_get(&req.uri, store),
        Method::Put => serve_put(&req.uri, &req.body, store),
        Method::Delete => serve_delete(&req.uri, store),
        Method::Other(_) => Response::new(501),
    }
}

fn serve_get(uri: &str, store: &mut dyn ObjectStore) -> Response {
    match store.read(uri) {
        Ok(body) => Response::new(200).with_body(body),
        Err(_) => Response::new(404),
    }
}

fn serve_put(uri: &str, body: &[u8], store: &mut dyn ObjectStore) -> Response {
    if !uri.starts_with("/dynamic") {
        return Response::new(403);
    }
    match store.write(uri, body) {
        Ok(WriteOutcome::Created) => Response::new(201),
        Ok(WriteOutcome::Replaced) => Response::new(204),
        Err(
            StoreError::ParentMissing { .. }
            | StoreError::IsDirectory { .. }
            | StoreError::CapacityExceeded { .. },
        ) => Response::new(400),
        Err(StoreError::NotFound { .. }) => Response::new(404),
    }
}

fn serve_delete(uri: &str, store: &mut dyn ObjectStore) -> Response {
    if !store.exists(uri) {
        return Response::new(404);
    }
    if !uri.starts_with("/dynamic") {
        return Response::new(403);
    }
    match store.remove(uri) {
        Ok(()) => Response::new(204),
        Err(StoreError::IsDirectory { .. }) => Response::new(400),
        Err(_) => Response::new(404),
    }
}
