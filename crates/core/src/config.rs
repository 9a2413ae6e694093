// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store configuration
//!
//! Loaded from TOML or built in code. Sizes are fixed when the backing file
//! is created and must match on every later open.
//!
//! ```toml
//! path = "/var/lib/app/duramen.data"
//! entries = 1000
//! entry_size = 4096
//!
//! [collision]
//! policy = "regenerate"
//! max_attempts = 8
//! ```

use crate::error::DatastoreError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILENAME: &str = "duramen.data";
pub const DEFAULT_ENTRIES: u32 = 1000;
pub const DEFAULT_ENTRY_SIZE: u32 = 4096;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// What `save_event` does when a freshly generated id is already live
///
/// `Overwrite` silently replaces the pending event that owned the id, so a
/// collision destroys an undelivered event. `Regenerate` never replaces, but
/// near full capacity or with a degenerate generator every draw may collide,
/// so it gives up after `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Last writer wins
    #[default]
    Overwrite,
    /// Draw a new id, at most `max_attempts` draws in total
    Regenerate {
        #[serde(default = "default_max_attempts")]
        max_attempts: u32,
    },
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Configuration for a file-backed store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Backing file, including file name
    pub path: PathBuf,
    /// Maximum number of events held at once
    pub entries: u32,
    /// Maximum payload size of a single event, in bytes
    pub entry_size: u32,
    pub collision: CollisionPolicy,
    /// Flush each written slot to disk before returning
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FILENAME),
            entries: DEFAULT_ENTRIES,
            entry_size: DEFAULT_ENTRY_SIZE,
            collision: CollisionPolicy::default(),
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration for a store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_entries(mut self, entries: u32) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_entry_size(mut self, entry_size: u32) -> Self {
        self.entry_size = entry_size;
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self, DatastoreError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DatastoreError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, DatastoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject parameters no store can be opened with
    pub fn validate(&self) -> Result<(), DatastoreError> {
        if self.path.as_os_str().is_empty() {
            return Err(DatastoreError::config("path must not be empty"));
        }
        if self.entries == 0 {
            return Err(DatastoreError::config("entries must be positive"));
        }
        if self.entry_size == 0 {
            return Err(DatastoreError::config("entry_size must be positive"));
        }
        if let CollisionPolicy::Regenerate { max_attempts: 0 } = self.collision {
            return Err(DatastoreError::config(
                "collision.max_attempts must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
