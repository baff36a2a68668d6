// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side effects that follow a committed mutation.
//!
//! Hooks run in order after the store write succeeded. A failing hook is
//! logged and counted; it never changes the result of the operation that
//! scheduled it.

use std::sync::Arc;

use tracing::{debug, warn};

use ecpds_cache::CachedStore;
use ecpds_core::types::{AuditRecord, TransferHistory};
use ecpds_core::{AuditSink, DispatchScheduler, MonitoringAdapter, PersistentStore};

use crate::recording::record_hook_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCommit {
    Audit(AuditRecord),
    History(TransferHistory),
    /// Ask the dispatch scheduler to reload the destination.
    Reschedule(String),
    MonitoringWakeup,
    InvalidateAll,
}

impl PostCommit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Audit(_) => "audit",
            Self::History(_) => "history",
            Self::Reschedule(_) => "reschedule",
            Self::MonitoringWakeup => "monitoring_wakeup",
            Self::InvalidateAll => "invalidate_all",
        }
    }
}

pub struct HookRunner {
    store: Arc<CachedStore>,
    dispatch: Arc<dyn DispatchScheduler>,
    monitoring: Arc<dyn MonitoringAdapter>,
    audit: Arc<dyn AuditSink>,
}

impl HookRunner {
    pub fn new(
        store: Arc<CachedStore>,
        dispatch: Arc<dyn DispatchScheduler>,
        monitoring: Arc<dyn MonitoringAdapter>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            dispatch,
            monitoring,
            audit,
        }
    }

    pub async fn run(&self, hooks: Vec<PostCommit>) {
        for hook in hooks {
            let label = hook.label();
            let result = match &hook {
                PostCommit::Audit(record) => self.audit.record(record).await,
                PostCommit::History(history) => {
                    self.store.insert_transfer_history(history).await
                }
                PostCommit::Reschedule(destination) => {
                    self.dispatch.reschedule(destination).await
                }
                PostCommit::MonitoringWakeup => {
                    if !self.monitoring.is_activated() {
                        debug!("monitoring inactive, wakeup skipped");
                        continue;
                    }
                    self.monitoring.wakeup().await
                }
                PostCommit::InvalidateAll => {
                    self.store.clear();
                    Ok(())
                }
            };
            if let Err(e) = result {
                record_hook_failure(label);
                warn!(hook = label, error = %e, "post-commit hook failed");
            }
        }
    }
}
