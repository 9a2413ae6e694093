// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! duramen-core: Datastore contract for durable event storage
//!
//! This crate provides:
//! - The `Datastore` capability contract used by delivery layers
//! - Event ID generation (`IdGen`) with random and test generators
//! - Store configuration, loadable from TOML
//! - A tracing wrapper and an in-memory fake for tests

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod datastore;
pub mod error;
pub mod id;
pub mod traced;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use config::{CollisionPolicy, StoreConfig};
pub use datastore::Datastore;
pub use error::DatastoreError;
pub use id::{EventId, FixedIdGen, IdGen, RandomIdGen, SequentialIdGen};
pub use traced::TracedDatastore;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{DatastoreCall, FakeDatastore};
