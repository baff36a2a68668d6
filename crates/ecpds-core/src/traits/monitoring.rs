// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monitoring subsystem signal.

use async_trait::async_trait;

use crate::error::EcpdsError;

#[async_trait]
pub trait MonitoringAdapter: Send + Sync + 'static {
    /// When false the control plane skips [`MonitoringAdapter::wakeup`] entirely.
    fn is_activated(&self) -> bool;

    /// Asks dashboards to refresh.
    async fn wakeup(&self) -> Result<(), EcpdsError>;
}
