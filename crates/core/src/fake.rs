// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory datastore for testing collaborators without a backing file

use crate::config::{DEFAULT_ENTRIES, DEFAULT_ENTRY_SIZE};
use crate::datastore::Datastore;
use crate::error::DatastoreError;
use crate::id::{EventId, IdGen, SequentialIdGen};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Recorded call to a datastore method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatastoreCall {
    SaveEvent { len: usize },
    DeleteEvent { id: EventId },
    StoredEvents,
    Close,
}

#[derive(Default)]
struct FakeState {
    events: HashMap<EventId, Vec<u8>>,
    calls: Vec<DatastoreCall>,
    closed: bool,
}

/// Fake datastore with the same capacity, size and close semantics as the
/// file-backed one
#[derive(Clone)]
pub struct FakeDatastore {
    inner: Arc<Mutex<FakeState>>,
    ids: SequentialIdGen,
    entries: u32,
    entry_size: u32,
}

impl Default for FakeDatastore {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRIES, DEFAULT_ENTRY_SIZE)
    }
}

impl FakeDatastore {
    pub fn new(entries: u32, entry_size: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState::default())),
            ids: SequentialIdGen::default(),
            entries,
            entry_size,
        }
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<DatastoreCall> {
        self.state().calls.clone()
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Datastore for FakeDatastore {
    fn save_event(&self, payload: &[u8]) -> Result<EventId, DatastoreError> {
        let mut state = self.state();
        state.calls.push(DatastoreCall::SaveEvent { len: payload.len() });
        if state.closed {
            return Err(DatastoreError::Closed);
        }
        if payload.len() > self.entry_size as usize {
            return Err(DatastoreError::PayloadTooLarge {
                len: payload.len(),
                entry_size: self.entry_size,
            });
        }
        let id = self.ids.next();
        if !state.events.contains_key(&id) && state.events.len() >= self.entries as usize {
            return Err(DatastoreError::CapacityExceeded {
                capacity: self.entries,
            });
        }
        state.events.insert(id, payload.to_vec());
        Ok(id)
    }

    fn delete_event(&self, id: EventId) -> Result<(), DatastoreError> {
        let mut state = self.state();
        state.calls.push(DatastoreCall::DeleteEvent { id });
        if state.closed {
            return Err(DatastoreError::Closed);
        }
        state.events.remove(&id);
        Ok(())
    }

    fn stored_events(&self) -> Result<HashMap<EventId, Vec<u8>>, DatastoreError> {
        let mut state = self.state();
        state.calls.push(DatastoreCall::StoredEvents);
        if state.closed {
            return Err(DatastoreError::Closed);
        }
        Ok(state.events.clone())
    }

    fn close(&self) -> Result<(), DatastoreError> {
        let mut state = self.state();
        state.calls.push(DatastoreCall::Close);
        if state.closed {
            return Err(DatastoreError::Closed);
        }
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
