// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-entity mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// One async mutex per key, created on first use.
///
/// Mutations of the same entity queue behind each other while different
/// entities proceed independently.
pub struct KeyedLocks {
    scope: &'static str,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            locks: DashMap::new(),
        }
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        match Arc::clone(&mutex).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(scope = self.scope, key, "waiting for entity lock");
                mutex.lock_owned().await
            }
        }
    }

    /// Drop the mutex of a removed entity once nobody holds or awaits it.
    pub fn forget(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tracing_test::traced_test;

    use super::*;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new("destination"));
        let guard = locks.lock("DEST1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("DEST1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::new("destination");
        let _a = locks.lock("DEST1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("DEST2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn forget_keeps_held_locks() {
        let locks = KeyedLocks::new("host");
        let guard = locks.lock("h1").await;
        locks.forget("h1");
        assert_eq!(locks.len(), 1);
        drop(guard);
        locks.forget("h1");
        assert!(locks.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn contended_lock_is_logged_with_its_scope() {
        let locks = Arc::new(KeyedLocks::new("transfer"));
        let guard = locks.lock("7").await;
        assert!(!logs_contain("waiting for entity lock"));

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("7").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        waiter.await.unwrap();
        assert!(logs_contain("waiting for entity lock"));
        assert!(logs_contain("transfer"));
    }
}
