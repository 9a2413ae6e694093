// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed datastore
//!
//! Events live in a [`SharedMap`] keyed by generated ids, so every process
//! pointed at the same file sees the same pending events.

use crate::shared_map::SharedMap;
use duramen_core::{
    CollisionPolicy, Datastore, DatastoreError, EventId, IdGen, RandomIdGen, StoreConfig,
};
use std::collections::HashMap;
use std::path::PathBuf;

/// Datastore persisting events in a memory-mapped file
pub struct FileDatastore<G = RandomIdGen> {
    map: SharedMap,
    ids: G,
    collision: CollisionPolicy,
}

impl FileDatastore<RandomIdGen> {
    /// Store in `duramen.data` in the working directory, default sizes
    pub fn open_default() -> Result<Self, DatastoreError> {
        Self::open(&StoreConfig::default())
    }

    /// Store at `path` (including file name), default sizes
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, DatastoreError> {
        Self::open(&StoreConfig::new(path))
    }

    pub fn open(config: &StoreConfig) -> Result<Self, DatastoreError> {
        Self::with_id_gen(config, RandomIdGen)
    }
}

impl<G: IdGen> FileDatastore<G> {
    /// Open with a custom id generator
    pub fn with_id_gen(config: &StoreConfig, ids: G) -> Result<Self, DatastoreError> {
        config.validate()?;
        let map = SharedMap::open(&config.path, config.entries, config.entry_size)?
            .sync_writes(config.sync_writes);

        Ok(Self {
            map,
            ids,
            collision: config.collision,
        })
    }

    /// The underlying table
    pub fn map(&self) -> &SharedMap {
        &self.map
    }
}

impl<G: IdGen> Datastore for FileDatastore<G> {
    fn save_event(&self, payload: &[u8]) -> Result<EventId, DatastoreError> {
        match self.collision {
            CollisionPolicy::Overwrite => {
                let id = self.ids.next();
                if self.map.put(id, payload)? {
                    tracing::warn!(
                        id,
                        path = %self.map.path().display(),
                        "event id collided with a stored event, previous payload overwritten"
                    );
                }
                Ok(id)
            }
            CollisionPolicy::Regenerate { max_attempts } => {
                for _ in 0..max_attempts {
                    let id = self.ids.next();
                    if self.map.insert_new(id, payload)? {
                        return Ok(id);
                    }
                    tracing::debug!(id, "event id collided, drawing another");
                }
                Err(DatastoreError::IdExhausted {
                    attempts: max_attempts,
                })
            }
        }
    }

    fn delete_event(&self, id: EventId) -> Result<(), DatastoreError> {
        self.map.remove(id)?;
        Ok(())
    }

    fn stored_events(&self) -> Result<HashMap<EventId, Vec<u8>>, DatastoreError> {
        Ok(self.map.snapshot()?)
    }

    fn close(&self) -> Result<(), DatastoreError> {
        Ok(self.map.close()?)
    }
}

#[cfg(test)]
#[path = "file_data_tests.rs"]
mod tests;
