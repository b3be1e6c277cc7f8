//! # torus-store
//!
//! The object store behind the HTTP resource tree: a bounded in-memory
//! hierarchy of directories and blobs, addressed by absolute paths such as
//! `/static/foo` and `/dynamic/bar`.
//!
//! The store covers create, read, overwrite and delete, and is consumed
//! through the [`ObjectStore`] trait so a different backing implementation
//! can be dropped in. Access policy (which prefixes are writable) is not
//! the store's concern; the HTTP layer enforces it.

pub mod memory;

pub use memory::MemoryStore;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entry at the given path.
    #[error("no such entry: {path}")]
    NotFound { path: String },

    /// The entry exists but is a directory where a blob is required.
    #[error("entry is a directory: {path}")]
    IsDirectory { path: String },

    /// The parent of the given path does not exist or is not a directory.
    #[error("parent directory missing for: {path}")]
    ParentMissing { path: String },

    /// The store holds its maximum number of entries.
    #[error("store full: {used} of {limit} entries in use")]
    CapacityExceeded { used: usize, limit: usize },
}

/// Convenience result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// What a write did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new blob was created.
    Created,
    /// An existing blob was overwritten.
    Replaced,
}

/// A keyed blob store with a directory hierarchy.
pub trait ObjectStore {
    /// Whether any entry (blob or directory) exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Read the blob at `path`. Reading a directory yields an empty body.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite the blob at `path`.
    fn write(&mut self, path: &str, body: &[u8]) -> Result<WriteOutcome>;

    /// Remove the blob at `path`. Directories cannot be removed.
    fn remove(&mut self, path: &str) -> Result<()>;

    /// Create a directory at `path`.
    fn make_dir(&mut self, path: &str) -> Result<()>;
}
