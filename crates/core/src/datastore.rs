// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datastore capability contract
//!
//! A datastore keeps opaque event payloads durable until they are explicitly
//! deleted. Callers save a serialized event before attempting delivery,
//! delete it once delivery is confirmed, and after a restart re-read every
//! pending event to drive redelivery.

use crate::error::DatastoreError;
use crate::id::EventId;
use std::collections::HashMap;

/// Durable storage for pending events
pub trait Datastore: Send + Sync {
    /// Persist a payload and return the id it was stored under.
    ///
    /// The payload is durable once this returns.
    fn save_event(&self, payload: &[u8]) -> Result<EventId, DatastoreError>;

    /// Remove an event. Unknown ids are ignored.
    fn delete_event(&self, id: EventId) -> Result<(), DatastoreError>;

    /// Copy of every stored event, keyed by id.
    ///
    /// The returned map is detached from the store.
    fn stored_events(&self) -> Result<HashMap<EventId, Vec<u8>>, DatastoreError>;

    /// Release the store. Every later call fails with [`DatastoreError::Closed`].
    fn close(&self) -> Result<(), DatastoreError>;
}
