// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! duramen-storage: Memory-mapped, process-shared event storage
//!
//! This crate provides:
//! - `SharedMap`: a fixed-capacity table in a file mapped by every process
//!   that opens it
//! - `FileDatastore`: the `Datastore` contract on top of `SharedMap`

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod file_data;
pub mod layout;
pub mod shared_map;

pub use file_data::FileDatastore;
pub use shared_map::{MapError, SharedMap};
