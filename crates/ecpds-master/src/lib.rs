// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination and data transfer state machine of the ECPDS master.
//!
//! [`ManagementService`] owns every administrative mutation: holding and
//! restarting destinations, removing them with a bounded cleanup pool, and
//! moving transfers through the [`transition`] table. Each mutation is
//! serialized per entity and followed by its [`hooks::PostCommit`] effects.

pub mod cleanup;
pub mod detached;
pub mod hooks;
pub mod locks;
pub mod recording;
pub mod service;
pub mod transfers;
pub mod transition;

pub use cleanup::{CleanupBatch, CleanupPool, CleanupReport};
pub use hooks::{HookRunner, PostCommit};
pub use service::{BulkOutcome, Collaborators, ManagementService, MasterSettings, RemovalReport};
pub use transfers::MAX_PRIORITY;
pub use transition::{Transition, TransitionKind, check_transition};
