// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contracts of the external collaborators the control plane consumes.
//!
//! All traits use `#[async_trait]` so they can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod audit;
pub mod authorization;
pub mod monitoring;
pub mod mover;
pub mod scheduler;
pub mod store;

pub use adapter::PluginAdapter;
pub use audit::AuditSink;
pub use authorization::Authorizer;
pub use monitoring::MonitoringAdapter;
pub use mover::{MoverAdapter, MoverRequest};
pub use scheduler::{DispatchScheduler, RetrievalScheduler, SchedulerKind};
pub use store::PersistentStore;
