// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced datastore wrapper for consistent observability

use crate::datastore::Datastore;
use crate::error::DatastoreError;
use crate::id::EventId;
use std::collections::HashMap;

/// Wrapper that adds tracing to any Datastore
#[derive(Clone)]
pub struct TracedDatastore<D> {
    inner: D,
}

impl<D> TracedDatastore<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Datastore> Datastore for TracedDatastore<D> {
    fn save_event(&self, payload: &[u8]) -> Result<EventId, DatastoreError> {
        let span = tracing::info_span!("datastore.save", len = payload.len());
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.save_event(payload);
        let elapsed = start.elapsed();

        match &result {
            Ok(id) => tracing::debug!(
                id,
                elapsed_us = elapsed.as_micros() as u64,
                "event saved"
            ),
            Err(e) => tracing::error!(
                elapsed_us = elapsed.as_micros() as u64,
                error = %e,
                "save failed"
            ),
        }

        result
    }

    fn delete_event(&self, id: EventId) -> Result<(), DatastoreError> {
        let span = tracing::info_span!("datastore.delete", id);
        let _guard = span.enter();

        let result = self.inner.delete_event(id);
        match &result {
            Ok(()) => tracing::debug!("event deleted"),
            Err(e) => tracing::error!(error = %e, "delete failed"),
        }

        result
    }

    fn stored_events(&self) -> Result<HashMap<EventId, Vec<u8>>, DatastoreError> {
        let span = tracing::info_span!("datastore.stored_events");
        let _guard = span.enter();

        let result = self.inner.stored_events();
        match &result {
            Ok(events) => tracing::info!(count = events.len(), "loaded stored events"),
            Err(e) => tracing::error!(error = %e, "snapshot failed"),
        }

        result
    }

    fn close(&self) -> Result<(), DatastoreError> {
        let span = tracing::info_span!("datastore.close");
        let _guard = span.enter();

        let result = self.inner.close();
        // Closing twice is a caller bug, but never fatal to the process
        match &result {
            Ok(()) => tracing::info!("closed"),
            Err(e) => tracing::warn!(error = %e, "close failed"),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
