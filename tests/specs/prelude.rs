//! Shared fixtures for specs

pub use duramen_core::{
    CollisionPolicy, Datastore, DatastoreError, EventId, FakeDatastore, SequentialIdGen,
    StoreConfig, TracedDatastore,
};
pub use duramen_storage::FileDatastore;
pub use std::collections::HashMap;

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A backing file in its own temporary directory
pub struct StoreFile {
    // Held so the directory outlives every store opened on it
    _dir: TempDir,
    path: PathBuf,
}

impl StoreFile {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duramen.data");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self, entries: u32, entry_size: u32) -> StoreConfig {
        StoreConfig::new(&self.path)
            .with_entries(entries)
            .with_entry_size(entry_size)
    }

    /// Open a store with random ids
    pub fn open(&self, entries: u32, entry_size: u32) -> FileDatastore {
        FileDatastore::open(&self.config(entries, entry_size)).unwrap()
    }
}
