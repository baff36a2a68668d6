// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock retrieval and dispatch schedulers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use ecpds_core::traits::scheduler::{DispatchScheduler, RetrievalScheduler, SchedulerKind};
use ecpds_core::types::TransferId;
use ecpds_core::EcpdsError;

/// A retrieval scheduler with a scripted set of in-flight retrievals.
pub struct MockRetrievalScheduler {
    kind: SchedulerKind,
    in_flight: Arc<Mutex<BTreeMap<TransferId, String>>>,
    interrupted: Arc<Mutex<Vec<TransferId>>>,
    destination_interrupts: Arc<Mutex<Vec<String>>>,
    stopped_listings: Arc<Mutex<Vec<String>>>,
    started: AtomicBool,
}

impl MockRetrievalScheduler {
    pub fn new(kind: SchedulerKind) -> Self {
        Self {
            kind,
            in_flight: Arc::new(Mutex::new(BTreeMap::new())),
            interrupted: Arc::new(Mutex::new(Vec::new())),
            destination_interrupts: Arc::new(Mutex::new(Vec::new())),
            stopped_listings: Arc::new(Mutex::new(Vec::new())),
            started: AtomicBool::new(true),
        }
    }

    /// Pretend a retrieval for `transfer` is running.
    pub async fn start_retrieval(&self, transfer: TransferId, destination: &str) {
        self.in_flight
            .lock()
            .await
            .insert(transfer, destination.to_string());
    }

    pub async fn in_flight(&self) -> Vec<TransferId> {
        self.in_flight.lock().await.keys().copied().collect()
    }

    /// Transfers whose retrieval was actually cancelled.
    pub async fn interrupted(&self) -> Vec<TransferId> {
        self.interrupted.lock().await.clone()
    }

    pub async fn destination_interrupts(&self) -> Vec<String> {
        self.destination_interrupts.lock().await.clone()
    }

    pub async fn stopped_listings(&self) -> Vec<String> {
        self.stopped_listings.lock().await.clone()
    }

    /// A stopped scheduler fails every call, like one that was never started.
    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), EcpdsError> {
        if self.started.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EcpdsError::transient(format!(
                "{} scheduler not started",
                self.kind
            )))
        }
    }
}

#[async_trait]
impl RetrievalScheduler for MockRetrievalScheduler {
    fn kind(&self) -> SchedulerKind {
        self.kind
    }

    async fn interrupt(&self, transfer: TransferId) -> Result<bool, EcpdsError> {
        self.guard()?;
        let found = self.in_flight.lock().await.remove(&transfer).is_some();
        if found {
            self.interrupted.lock().await.push(transfer);
        }
        Ok(found)
    }

    async fn interrupt_destination(&self, destination: &str) -> Result<usize, EcpdsError> {
        self.guard()?;
        self.destination_interrupts
            .lock()
            .await
            .push(destination.to_string());
        let mut in_flight = self.in_flight.lock().await;
        let targets: Vec<TransferId> = in_flight
            .iter()
            .filter(|(_, dest)| dest.as_str() == destination)
            .map(|(id, _)| *id)
            .collect();
        for id in &targets {
            in_flight.remove(id);
        }
        self.interrupted.lock().await.extend(targets.iter().copied());
        Ok(targets.len())
    }

    async fn stop_listing(&self, host: &str) -> Result<(), EcpdsError> {
        self.guard()?;
        self.stopped_listings.lock().await.push(host.to_string());
        Ok(())
    }
}

/// A dispatch scheduler that records reschedule and shutdown requests.
pub struct MockDispatch {
    rescheduled: Arc<Mutex<Vec<String>>>,
    shutdowns: Arc<Mutex<Vec<(String, bool)>>>,
}

impl MockDispatch {
    pub fn new() -> Self {
        Self {
            rescheduled: Arc::new(Mutex::new(Vec::new())),
            shutdowns: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn rescheduled(&self) -> Vec<String> {
        self.rescheduled.lock().await.clone()
    }

    /// `(destination, graceful)` pairs in call order.
    pub async fn shutdowns(&self) -> Vec<(String, bool)> {
        self.shutdowns.lock().await.clone()
    }
}

impl Default for MockDispatch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchScheduler for MockDispatch {
    async fn reschedule(&self, destination: &str) -> Result<(), EcpdsError> {
        self.rescheduled.lock().await.push(destination.to_string());
        Ok(())
    }

    async fn shutdown_destination(
        &self,
        destination: &str,
        graceful: bool,
    ) -> Result<(), EcpdsError> {
        self.shutdowns
            .lock()
            .await
            .push((destination.to_string(), graceful));
        Ok(())
    }
}
