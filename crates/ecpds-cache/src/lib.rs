// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache consistency layer for the ECPDS master.
//!
//! Read caches are disposable: dropping all of them only costs extra store
//! reads. Invalidation is funnelled through [`CachedStore`]'s write path.

use std::time::Duration;

use ecpds_config::model::CacheConfig;

pub mod snapshot;
pub mod store;
pub mod transfer;
pub mod ttl;

pub use snapshot::{DestinationSnapshot, MonitoringSnapshot, SchedulerView};
pub use store::CachedStore;
pub use transfer::TransferCache;
pub use ttl::{Population, TtlCache};

/// Freshness windows of the three caches.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub destination_ttl: Duration,
    pub monitoring_ttl: Duration,
    pub transfer_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            destination_ttl: config.destination_ttl(),
            monitoring_ttl: config.monitoring_ttl(),
            transfer_ttl: config.transfer_ttl(),
        }
    }
}
