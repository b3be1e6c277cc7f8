//! In-memory [`ObjectStore`] implementation.

use std::collections::{BTreeMap, BTreeSet};

use crate::{ObjectStore, Result, StoreError, WriteOutcome};

/// Bounded in-memory store. The root directory `/` always exists.
///
/// Capacity counts entries (blobs plus created directories); overwriting an
/// existing blob never consumes a new entry.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    capacity: usize,
}

impl MemoryStore {
    /// Create an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            dirs: BTreeSet::new(),
            files: BTreeMap::new(),
            capacity,
        }
    }

    fn used(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path)
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.used() >= self.capacity {
            return Err(StoreError::CapacityExceeded {
                used: self.used(),
                limit: self.capacity,
            });
        }
        Ok(())
    }
}

impl ObjectStore for MemoryStore {
    fn exists(&self, path: &str) -> bool {
        self.is_dir(path) || self.files.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        if let Some(body) = self.files.get(path) {
            return Ok(body.clone());
        }
        if self.is_dir(path) {
            return Ok(Vec::new());
        }
        Err(StoreError::NotFound {
            path: path.to_string(),
        })
    }

    fn write(&mut self, path: &str, body: &[u8]) -> Result<WriteOutcome> {
        if self.is_dir(path) {
            return Err(StoreError::IsDirectory {
                path: path.to_string(),
            });
        }
        if !self.is_dir(parent_of(path)) {
            return Err(StoreError::ParentMissing {
                path: path.to_string(),
            });
        }

        if self.files.contains_key(path) {
            self.files.insert(path.to_string(), body.to_vec());
            return Ok(WriteOutcome::Replaced);
        }

        self.ensure_capacity()?;
        self.files.insert(path.to_string(), body.to_vec());
        Ok(WriteOutcome::Created)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        if self.files.remove(path).is_some() {
            return Ok(());
        }
        if self.is_dir(path) {
            return Err(StoreError::IsDirectory {
                path: path.to_string(),
            });
        }
        Err(StoreError::NotFound {
            path: path.to_string(),
        })
    }

    fn make_dir(&mut self, path: &str) -> Result<()> {
        if self.exists(path) {
            return Ok(());
        }
        if !self.is_dir(parent_of(path)) {
            return Err(StoreError::ParentMissing {
                path: path.to_string(),
            });
        }
        self.ensure_capacity()?;
        self.dirs.insert(path.to_string());
        Ok(())
    }
}

/// The directory containing `path`. `/foo` lives in `/`.
fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}
