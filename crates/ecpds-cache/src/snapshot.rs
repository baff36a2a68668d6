// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregated read models assembled from the persistent store.

use chrono::{DateTime, Utc};

use ecpds_core::types::{
    Association, DataTransfer, Destination, DestinationStatus, Host, TransferId, TransferStatus,
};
use ecpds_core::{EcpdsError, PersistentStore};

/// A destination with its host graph, read in a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSnapshot {
    pub destination: Destination,
    /// Highest priority first.
    pub associations: Vec<Association>,
    /// Hosts in association order; dangling associations are skipped.
    pub hosts: Vec<Host>,
    pub users: Vec<String>,
    pub aliases: Vec<String>,
}

impl DestinationSnapshot {
    pub async fn load(
        store: &dyn PersistentStore,
        name: &str,
    ) -> Result<Option<Self>, EcpdsError> {
        let Some(destination) = store.get_destination(name).await? else {
            return Ok(None);
        };
        let associations = store.list_associations(name).await?;
        let mut hosts = Vec::with_capacity(associations.len());
        for association in &associations {
            if let Some(host) = store.get_host(&association.host).await? {
                hosts.push(host);
            }
        }
        let users = store.list_destination_users(name).await?;
        let aliases = store.list_aliases(name).await?;
        Ok(Some(Self {
            destination,
            associations,
            hosts,
            users,
            aliases,
        }))
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }
}

/// Scheduler-facing view of a destination's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerView {
    pub status: DestinationStatus,
    /// Transfers still waiting to be delivered.
    pub pending: usize,
    pub last_transfer: Option<TransferId>,
    pub last_failed: Option<TransferId>,
    /// Live (not deleted) transfers known for the destination.
    pub transfers_in_cache: usize,
}

/// Derived counters shown on monitoring dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringSnapshot {
    pub bad_transfers: usize,
    pub scheduler: SchedulerView,
}

impl MonitoringSnapshot {
    pub async fn load(
        store: &dyn PersistentStore,
        name: &str,
    ) -> Result<Option<Self>, EcpdsError> {
        let Some(destination) = store.get_destination(name).await? else {
            return Ok(None);
        };
        let transfers = store.list_destination_transfers(name).await?;
        Ok(Some(Self::from_transfers(destination.status, &transfers)))
    }

    pub fn from_transfers(status: DestinationStatus, transfers: &[DataTransfer]) -> Self {
        let bad_transfers = transfers.iter().filter(|t| t.status.is_bad()).count();
        let pending = transfers.iter().filter(|t| t.status.is_pending()).count();
        let last_transfer = latest(transfers, |t| {
            (t.status == TransferStatus::Done).then_some(t.finish_time).flatten()
        });
        let last_failed = latest(transfers, |t| t.failed_time);
        Self {
            bad_transfers,
            scheduler: SchedulerView {
                status,
                pending,
                last_transfer,
                last_failed,
                transfers_in_cache: transfers.len(),
            },
        }
    }
}

fn latest(
    transfers: &[DataTransfer],
    time: impl Fn(&DataTransfer) -> Option<DateTime<Utc>>,
) -> Option<TransferId> {
    transfers
        .iter()
        .filter_map(|t| time(t).map(|at| (at, t.id)))
        .max()
        .map(|(_, id)| id)
}
