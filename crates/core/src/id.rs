// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event ID generation abstractions

use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Identifier of a stored event
pub type EventId = i64;

/// Generates identifiers for new events
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> EventId;
}

/// Uniform random ID generator for production use
///
/// Draws from the full signed 64-bit range, negatives included. Several
/// processes write the same store without sharing a counter, so ids are
/// unique only with high probability: the chance of any collision among
/// `n` live events is roughly `n² / 2⁶⁵`. Negligible for thousands of
/// entries, but never zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdGen;

impl IdGen for RandomIdGen {
    fn next(&self) -> EventId {
        rand::thread_rng().gen::<i64>()
    }
}

/// Sequential ID generator for testing
///
/// Clones share the counter.
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    counter: Arc<AtomicI64>,
}

impl SequentialIdGen {
    pub fn new(start: EventId) -> Self {
        Self {
            counter: Arc::new(AtomicI64::new(start)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> EventId {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// Replays a fixed sequence of IDs, wrapping around at the end
///
/// Useful for forcing collisions in tests.
#[derive(Clone, Debug)]
pub struct FixedIdGen {
    ids: Arc<[EventId]>,
    cursor: Arc<AtomicUsize>,
}

impl FixedIdGen {
    /// Create a generator over `ids`. An empty list yields `0` forever.
    pub fn new(ids: impl Into<Vec<EventId>>) -> Self {
        let ids: Vec<EventId> = ids.into();
        Self {
            ids: ids.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl IdGen for FixedIdGen {
    fn next(&self) -> EventId {
        if self.ids.is_empty() {
            return 0;
        }
        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.ids[n % self.ids.len()]
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
