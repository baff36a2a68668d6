// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-slot cache of the most recently read transfer.
//!
//! Movers poll the same transfer repeatedly while it is running, so one slot
//! with a short freshness window absorbs most of those reads.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use ecpds_core::types::{DataTransfer, TransferId};

struct Slot {
    transfer: DataTransfer,
    stored_at: Instant,
}

pub struct TransferCache {
    ttl: Duration,
    slot: Mutex<Option<Slot>>,
    generation: AtomicU64,
}

impl TransferCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The cached transfer when it is `id` and still fresh.
    ///
    /// A poisoned slot is reported as a miss so the caller reads the store.
    pub fn get(&self, id: TransferId) -> Option<DataTransfer> {
        let hit = match self.slot.lock() {
            Ok(slot) => slot
                .as_ref()
                .filter(|s| s.transfer.id == id && s.stored_at.elapsed() < self.ttl)
                .map(|s| s.transfer.clone()),
            Err(_) => {
                warn!(transfer = %id, "transfer cache lock poisoned, reading store");
                None
            }
        };
        let result = if hit.is_some() { "hit" } else { "miss" };
        metrics::counter!("ecpds_cache_lookups_total", "cache" => "transfer", "result" => result)
            .increment(1);
        hit
    }

    /// Generation to hand back to [`TransferCache::complete`].
    pub fn begin(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn complete(&self, generation: u64, transfer: &DataTransfer) {
        if transfer.deleted {
            return;
        }
        let Ok(mut slot) = self.slot.lock() else {
            return;
        };
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(Slot {
                transfer: transfer.clone(),
                stored_at: Instant::now(),
            });
        }
    }

    pub fn invalidate(&self, id: TransferId) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        match self.slot.lock() {
            Ok(mut slot) => {
                if slot.as_ref().is_some_and(|s| s.transfer.id == id) {
                    *slot = None;
                }
            }
            Err(poisoned) => {
                *poisoned.into_inner() = None;
                self.slot.clear_poison();
            }
        }
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        match self.slot.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => {
                *poisoned.into_inner() = None;
                self.slot.clear_poison();
            }
        }
    }
}
