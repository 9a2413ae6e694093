// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for datastore operations

use thiserror::Error;

/// Errors that can occur in datastore operations
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// Invalid or mismatched store parameters. Fatal at open, never retried.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store is full: all {capacity} slots are occupied")]
    CapacityExceeded { capacity: u32 },
    #[error("payload of {len} bytes exceeds entry size of {entry_size} bytes")]
    PayloadTooLarge { len: usize, entry_size: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store is closed")]
    Closed,
    #[error("no unused event id after {attempts} attempts")]
    IdExhausted { attempts: u32 },
}

impl DatastoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
