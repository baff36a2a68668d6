// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler interfaces driven by the state machine.

use async_trait::async_trait;
use strum::{Display, EnumString};

use crate::error::EcpdsError;
use crate::types::TransferId;

/// Which retrieval scheduler an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SchedulerKind {
    Ordinary,
    Acquisition,
}

/// A scheduler downloading data files onto movers.
///
/// All calls signal and return; none waits for remote I/O to stop.
#[async_trait]
pub trait RetrievalScheduler: Send + Sync + 'static {
    fn kind(&self) -> SchedulerKind;

    /// Cancels an in-flight retrieval. `Ok(false)` when nothing was running.
    async fn interrupt(&self, transfer: TransferId) -> Result<bool, EcpdsError>;

    /// Cancels every in-flight retrieval of a destination; returns how many were found.
    async fn interrupt_destination(&self, destination: &str) -> Result<usize, EcpdsError>;

    /// Stops any running remote listing on the host.
    async fn stop_listing(&self, host: &str) -> Result<(), EcpdsError>;
}

/// The per-destination dissemination scheduler.
#[async_trait]
pub trait DispatchScheduler: Send + Sync + 'static {
    /// Reloads the destination and picks up queue changes.
    async fn reschedule(&self, destination: &str) -> Result<(), EcpdsError>;

    /// Stops the destination's dispatch loop, letting running work drain when `graceful`.
    async fn shutdown_destination(
        &self,
        destination: &str,
        graceful: bool,
    ) -> Result<(), EcpdsError>;
}
