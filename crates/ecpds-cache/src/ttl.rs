// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed cache with a freshness window and invalidation generations.
//!
//! Populating an entry is split in two: [`TtlCache::begin`] captures the
//! key's generation before the store is read, and [`TtlCache::complete`]
//! stores the result only if no invalidation was observed in between. The
//! freshly loaded value is returned either way, so a racing invalidation
//! never forces the caller to reload.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

struct Entry<V> {
    value: Arc<V>,
    stored_at: Instant,
    generation: u64,
    epoch: u64,
}

/// Captured state of a key at the start of a store read.
#[derive(Debug)]
pub struct Population<K> {
    key: K,
    generation: u64,
    epoch: u64,
}

impl<K> Population<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: DashMap<K, Entry<V>>,
    generations: DashMap<K, u64>,
    epoch: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// `name` labels the lookup metrics.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: DashMap::new(),
            generations: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn generation(&self, key: &K) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }

    /// A fresh, not invalidated value for `key`.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let generation = self.generation(key);
        let hit = self.entries.get(key).and_then(|entry| {
            let fresh = entry.stored_at.elapsed() < self.ttl
                && entry.generation == generation
                && entry.epoch == epoch;
            fresh.then(|| Arc::clone(&entry.value))
        });

        let result = if hit.is_some() { "hit" } else { "miss" };
        metrics::counter!("ecpds_cache_lookups_total", "cache" => self.name, "result" => result)
            .increment(1);
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| {
                entry.stored_at.elapsed() >= self.ttl
                    || entry.generation != generation
                    || entry.epoch != epoch
            });
        }
        hit
    }

    pub fn begin(&self, key: K) -> Population<K> {
        Population {
            generation: self.generation(&key),
            epoch: self.epoch.load(Ordering::Acquire),
            key,
        }
    }

    /// Store `value` unless `key` was invalidated since `begin`.
    pub fn complete(&self, population: Population<K>, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let Population {
            key,
            generation,
            epoch,
        } = population;
        // The shard lock taken by `entry` orders this check against `invalidate`.
        let entry = self.entries.entry(key.clone());
        if self.generation(&key) == generation && self.epoch.load(Ordering::Acquire) == epoch {
            entry.insert(Entry {
                value: Arc::clone(&value),
                stored_at: Instant::now(),
                generation,
                epoch,
            });
        }
        value
    }

    pub fn invalidate(&self, key: &K) {
        *self.generations.entry(key.clone()).or_insert(0) += 1;
        self.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
