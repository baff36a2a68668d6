// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the ECPDS master control plane.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the [`SqliteStore`] adapter
//! implementing both the persistent store and the audit sink contracts.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
mod rows;

pub use adapter::SqliteStore;
pub use database::Database;
