// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for ECPDS integration tests.
//!
//! Provides an in-memory store, mock collaborators and a harness wiring the
//! whole master together, for fast deterministic tests without a database,
//! movers or schedulers.
//!
//! # Components
//!
//! - [`MemoryStore`] - `PersistentStore` over plain maps
//! - [`MockMover`] - mover serving an in-memory file tree
//! - [`TestHarness`] - cache, management service, tickets and proxy over the mocks

pub mod fixtures;
pub mod harness;
pub mod memory_store;
pub mod mock_collaborators;
pub mod mock_mover;
pub mod mock_scheduler;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_store::{MemoryStore, Pause};
pub use mock_collaborators::{MockMonitoring, RecordingAudit, ScriptedAuthorizer};
pub use mock_mover::MockMover;
pub use mock_scheduler::{MockDispatch, MockRetrievalScheduler};
