// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock monitoring, audit and authorization collaborators.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use ecpds_core::traits::{AuditSink, Authorizer, MonitoringAdapter};
use ecpds_core::types::{AuditOutcome, AuditRecord, Principal, Resource};
use ecpds_core::EcpdsError;

/// Counts wakeups; can be deactivated or made to fail.
pub struct MockMonitoring {
    activated: AtomicBool,
    failing: AtomicBool,
    wakeups: AtomicUsize,
}

impl MockMonitoring {
    pub fn new() -> Self {
        Self {
            activated: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            wakeups: AtomicUsize::new(0),
        }
    }

    pub fn set_activated(&self, activated: bool) {
        self.activated.store(activated, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of wakeup calls received, failed ones included.
    pub fn wakeups(&self) -> usize {
        self.wakeups.load(Ordering::SeqCst)
    }
}

impl Default for MockMonitoring {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonitoringAdapter for MockMonitoring {
    fn is_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    async fn wakeup(&self) -> Result<(), EcpdsError> {
        self.wakeups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EcpdsError::transient("monitoring unreachable"));
        }
        Ok(())
    }
}

/// Captures every audit record.
pub struct RecordingAudit {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    /// `(operation, target, succeeded)` triples in emission order.
    pub async fn summary(&self) -> Vec<(String, String, bool)> {
        self.records
            .lock()
            .await
            .iter()
            .map(|r| {
                (
                    r.operation.clone(),
                    r.target.clone(),
                    r.outcome == AuditOutcome::Success,
                )
            })
            .collect()
    }
}

impl Default for RecordingAudit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, record: &AuditRecord) -> Result<(), EcpdsError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

/// Allows everything except explicitly denied resources.
pub struct ScriptedAuthorizer {
    denied: Arc<Mutex<HashSet<Resource>>>,
}

impl ScriptedAuthorizer {
    pub fn allow_all() -> Self {
        Self {
            denied: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn deny(&self, resource: Resource) {
        self.denied.lock().await.insert(resource);
    }
}

impl Default for ScriptedAuthorizer {
    fn default() -> Self {
        Self::allow_all()
    }
}

#[async_trait]
impl Authorizer for ScriptedAuthorizer {
    async fn is_authorized(
        &self,
        _principal: &Principal,
        resource: &Resource,
    ) -> Result<bool, EcpdsError> {
        Ok(!self.denied.lock().await.contains(resource))
    }
}
