// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-facing file access for the ECPDS master.
//!
//! A logical path such as `data/DEST1/20260101/foo.bin` starts with a
//! [`Domain`] tag. The [`resolve`] table turns the rest into a [`resolve::Node`]
//! and [`ProxyProvider`] serves the operation, issuing a ticket whenever
//! bytes have to flow.

pub mod attachments;
pub mod data;
pub mod domain;
pub mod provider;
pub mod resolve;

pub use attachments::{AttachmentStore, MKDIR_MARKER, Scope};
pub use domain::{Capabilities, DirectorySupport, Domain, LogicalPath};
pub use provider::{ProxyProvider, ProxySettings};
pub use resolve::Resolver;
