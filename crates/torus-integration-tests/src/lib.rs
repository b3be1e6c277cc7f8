//! Integration test crate for the torus ring protocol.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise protocol flows across multiple workspace crates by
//! feeding packets and requests through the pure handlers, without any
//! network I/O.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p torus-integration-tests
//! ```
