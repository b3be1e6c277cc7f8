//! # torus-http
//!
//! The HTTP/1.1 surface of a torus node: a minimal request/response codec,
//! the status-code table, and the routing shim that decides — per request —
//! between serving locally, redirecting to the successor, and kicking off
//! an asynchronous ring lookup.
//!
//! The codec intentionally covers only what the node speaks: GET/PUT/DELETE
//! requests with optional `Content-Length` bodies, and responses with a
//! fixed small header set. It does no I/O; the event loop owns the sockets.

pub mod codec;
pub mod routing;
pub mod status;

pub use codec::{Method, Request, Response};
pub use routing::{route, uri_hash, Routed};

/// Error types for HTTP parsing.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The request could not be parsed.
    #[error("malformed request: {0}")]
    Malformed(&'static str),
}

/// Convenience result type for HTTP operations.
pub type Result<T> = std::result::Result<T, HttpError>;
