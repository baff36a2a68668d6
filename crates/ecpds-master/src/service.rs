// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative operations on destinations and hosts.
//!
//! Every public operation is serialized per entity, emits one audit record
//! whatever its outcome, and schedules its remaining side effects as
//! post-commit hooks. Transfer operations live in [`crate::transfers`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use ecpds_cache::{CachedStore, DestinationSnapshot};
use ecpds_config::EcpdsConfig;
use ecpds_core::types::{
    AuditOutcome, AuditRecord, DestinationStatus, HostKind, Principal, TransferId, TransferStatus,
};
use ecpds_core::{
    AuditSink, DispatchScheduler, EcpdsError, MonitoringAdapter, PersistentStore,
    RetrievalScheduler,
};

use crate::cleanup::{CleanupPool, CleanupReport};
use crate::hooks::{HookRunner, PostCommit};
use crate::locks::KeyedLocks;
use crate::recording::record_transition;
use crate::transfers::Cleaner;

/// Destinations held or restarted concurrently by the bulk operations.
const BULK_PARALLELISM: usize = 16;

/// External collaborators of the state machine.
pub struct Collaborators {
    pub store: Arc<CachedStore>,
    pub dispatch: Arc<dyn DispatchScheduler>,
    pub ordinary: Arc<dyn RetrievalScheduler>,
    pub acquisition: Arc<dyn RetrievalScheduler>,
    pub monitoring: Arc<dyn MonitoringAdapter>,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Debug, Clone)]
pub struct MasterSettings {
    pub cleanup_concurrency: usize,
    pub cleanup_queue: usize,
    /// Root of the per-destination attachment directories.
    pub attachments_dir: PathBuf,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self::from(&EcpdsConfig::default())
    }
}

impl From<&EcpdsConfig> for MasterSettings {
    fn from(config: &EcpdsConfig) -> Self {
        Self {
            cleanup_concurrency: config.cleanup.concurrency,
            cleanup_queue: config.cleanup.queue,
            attachments_dir: PathBuf::from(&config.proxy.attachments_dir),
        }
    }
}

/// Result of `hold_all` / `restart_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub succeeded: usize,
    /// `(destination, error)` for every destination that could not be changed.
    pub failed: Vec<(String, String)>,
}

/// What `remove_destination` got done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub cleanup: CleanupReport,
    pub removed_hosts: Vec<String>,
    pub detached_hosts: Vec<String>,
    pub removed_permissions: usize,
    pub destination_removed: bool,
}

pub struct ManagementService {
    pub(crate) store: Arc<CachedStore>,
    pub(crate) dispatch: Arc<dyn DispatchScheduler>,
    pub(crate) ordinary: Arc<dyn RetrievalScheduler>,
    pub(crate) acquisition: Arc<dyn RetrievalScheduler>,
    pub(crate) hooks: HookRunner,
    pub(crate) destination_locks: KeyedLocks,
    pub(crate) transfer_locks: Arc<KeyedLocks>,
    host_locks: KeyedLocks,
    cleanup: CleanupPool,
    attachments_dir: PathBuf,
}

impl ManagementService {
    pub fn new(collaborators: Collaborators, settings: MasterSettings) -> Self {
        let Collaborators {
            store,
            dispatch,
            ordinary,
            acquisition,
            monitoring,
            audit,
        } = collaborators;
        let hooks = HookRunner::new(Arc::clone(&store), Arc::clone(&dispatch), monitoring, audit);
        Self {
            store,
            dispatch,
            ordinary,
            acquisition,
            hooks,
            destination_locks: KeyedLocks::new("destination"),
            transfer_locks: Arc::new(KeyedLocks::new("transfer")),
            host_locks: KeyedLocks::new("host"),
            cleanup: CleanupPool::new(settings.cleanup_concurrency, settings.cleanup_queue),
            attachments_dir: settings.attachments_dir,
        }
    }

    /// The cache-backed store every read and write goes through.
    pub fn store(&self) -> &Arc<CachedStore> {
        &self.store
    }

    pub fn hooks(&self) -> &HookRunner {
        &self.hooks
    }

    pub(crate) fn cleaner(&self) -> Cleaner {
        Cleaner {
            store: Arc::clone(&self.store),
            ordinary: Arc::clone(&self.ordinary),
            acquisition: Arc::clone(&self.acquisition),
            locks: Arc::clone(&self.transfer_locks),
        }
    }

    /// Emit the audit record of an operation and pass its result through.
    pub(crate) async fn finish<T>(
        &self,
        actor: &Principal,
        operation: &'static str,
        target: String,
        started: Instant,
        result: Result<T, EcpdsError>,
    ) -> Result<T, EcpdsError> {
        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(e) => AuditOutcome::Failure(e.to_string()),
        };
        debug!(
            operation,
            target = %target,
            outcome = %outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "call finished"
        );
        self.hooks
            .run(vec![PostCommit::Audit(AuditRecord::new(
                actor.as_str(),
                operation,
                target,
                outcome,
            ))])
            .await;
        result
    }

    async fn snapshot(&self, name: &str) -> Result<Arc<DestinationSnapshot>, EcpdsError> {
        self.store
            .destination_snapshot(name)
            .await?
            .ok_or_else(|| EcpdsError::NotFound(format!("destination {name}")))
    }

    /// Status as seen by operators: an idle queue with work pending is `SCHE`.
    pub async fn destination_status(&self, name: &str) -> Result<DestinationStatus, EcpdsError> {
        let snapshot = self.snapshot(name).await?;
        let status = snapshot.destination.status;
        if status != DestinationStatus::Wait {
            return Ok(status);
        }
        let pending = self
            .store
            .monitoring_snapshot(name)
            .await?
            .map_or(0, |m| m.scheduler.pending);
        Ok(if pending > 0 {
            DestinationStatus::Sche
        } else {
            status
        })
    }

    /// Stop a destination. An immediate hold also interrupts running retrievals.
    #[instrument(skip(self))]
    pub async fn hold(
        &self,
        actor: &Principal,
        name: &str,
        graceful: bool,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let _guard = self.destination_locks.lock(name).await;
            let snapshot = self.snapshot(name).await?;
            self.hold_locked(&snapshot, graceful).await
        }
        .await;
        self.finish(actor, "hold", name.to_string(), started, result)
            .await
    }

    async fn hold_locked(
        &self,
        snapshot: &DestinationSnapshot,
        graceful: bool,
    ) -> Result<(), EcpdsError> {
        let name = snapshot.destination.name.as_str();
        let mut destination = self
            .store
            .inner()
            .get_destination(name)
            .await?
            .ok_or_else(|| EcpdsError::NotFound(format!("destination {name}")))?;

        if destination.status == DestinationStatus::Stop {
            debug!(destination = %name, "destination already stopped");
        } else {
            let previous = destination.status;
            destination.status = DestinationStatus::Stop;
            let reason = if graceful {
                "Graceful stop"
            } else {
                "Immediate stop"
            };
            destination.user_status = Some(reason.to_string());
            self.store.update_destination(&destination).await?;
            record_transition("destination", "hold");
            info!(
                destination = %name,
                from = previous.display_name(),
                graceful,
                "destination held"
            );
        }

        if let Err(e) = self.dispatch.shutdown_destination(name, graceful).await {
            warn!(destination = %name, error = %e, "dispatch shutdown failed");
        }
        if !graceful {
            self.interrupt_destination_work(snapshot).await;
        }
        self.hooks.run(vec![PostCommit::MonitoringWakeup]).await;
        Ok(())
    }

    /// Cancel running retrievals and listings of a destination. Best effort.
    async fn interrupt_destination_work(&self, snapshot: &DestinationSnapshot) {
        let name = snapshot.destination.name.as_str();
        for scheduler in [&self.ordinary, &self.acquisition] {
            match scheduler.interrupt_destination(name).await {
                Ok(count) => debug!(
                    destination = %name,
                    scheduler = %scheduler.kind(),
                    count,
                    "retrievals interrupted"
                ),
                Err(e) => warn!(
                    destination = %name,
                    scheduler = %scheduler.kind(),
                    error = %e,
                    "could not interrupt retrievals"
                ),
            }
        }
        for host in snapshot
            .hosts
            .iter()
            .filter(|h| h.kind == HostKind::Acquisition)
        {
            if let Err(e) = self.acquisition.stop_listing(&host.name).await {
                warn!(host = %host.name, error = %e, "could not stop listing");
            }
        }
    }

    /// Put a destination back in the queue.
    #[instrument(skip(self))]
    pub async fn restart(
        &self,
        actor: &Principal,
        name: &str,
        graceful: bool,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let _guard = self.destination_locks.lock(name).await;
            let snapshot = self.snapshot(name).await?;
            if !graceful {
                self.interrupt_destination_work(&snapshot).await;
            }
            let mut destination = self
                .store
                .inner()
                .get_destination(name)
                .await?
                .ok_or_else(|| EcpdsError::NotFound(format!("destination {name}")))?;
            let previous = destination.status;
            destination.status = DestinationStatus::Wait;
            destination.user_status = None;
            destination.scheduler.start_count += 1;
            self.store.update_destination(&destination).await?;
            record_transition("destination", "restart");
            info!(
                destination = %name,
                from = previous.display_name(),
                graceful,
                "destination restarted"
            );
            self.hooks
                .run(vec![
                    PostCommit::Reschedule(name.to_string()),
                    PostCommit::MonitoringWakeup,
                ])
                .await;
            Ok(())
        }
        .await;
        self.finish(actor, "restart", name.to_string(), started, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn hold_all(
        &self,
        actor: &Principal,
        graceful: bool,
    ) -> Result<BulkOutcome, EcpdsError> {
        let started = Instant::now();
        let result = self.bulk(actor, graceful, true).await;
        self.finish(actor, "hold_all", "*".to_string(), started, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn restart_all(
        &self,
        actor: &Principal,
        graceful: bool,
    ) -> Result<BulkOutcome, EcpdsError> {
        let started = Instant::now();
        let result = self.bulk(actor, graceful, false).await;
        self.finish(actor, "restart_all", "*".to_string(), started, result)
            .await
    }

    async fn bulk(
        &self,
        actor: &Principal,
        graceful: bool,
        hold: bool,
    ) -> Result<BulkOutcome, EcpdsError> {
        let names: Vec<String> = self
            .store
            .list_destinations()
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect();

        let results: Vec<(String, Result<(), EcpdsError>)> = futures::stream::iter(names)
            .map(|name| async move {
                let result = if hold {
                    self.hold(actor, &name, graceful).await
                } else {
                    self.restart(actor, &name, graceful).await
                };
                (name, result)
            })
            .buffer_unordered(BULK_PARALLELISM)
            .collect()
            .await;

        let mut outcome = BulkOutcome::default();
        for (name, result) in results {
            match result {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => outcome.failed.push((name, e.to_string())),
            }
        }
        outcome.failed.sort();
        Ok(outcome)
    }

    /// Tear a destination down, or only clean its transfers when `clean_only`.
    ///
    /// Transfers are cleaned when `purge_all`, when expired, or when stopped or
    /// failed. Per-item failures are logged; only deleting the destination
    /// record itself fails the operation.
    #[instrument(skip(self))]
    pub async fn remove_destination(
        &self,
        actor: &Principal,
        name: &str,
        purge_all: bool,
        clean_only: bool,
    ) -> Result<RemovalReport, EcpdsError> {
        let started = Instant::now();
        let operation = if clean_only { "clean" } else { "remove" };
        let result: Result<RemovalReport, EcpdsError> = async {
            let guard = self.destination_locks.lock(name).await;
            let report = self
                .remove_locked(actor, name, purge_all, clean_only)
                .await;
            drop(guard);
            if matches!(&report, Ok(r) if r.destination_removed) {
                self.destination_locks.forget(name);
            }
            report
        }
        .await;
        self.finish(actor, operation, name.to_string(), started, result)
            .await
    }

    async fn remove_locked(
        &self,
        actor: &Principal,
        name: &str,
        purge_all: bool,
        clean_only: bool,
    ) -> Result<RemovalReport, EcpdsError> {
        let snapshot = self.snapshot(name).await?;

        if let Err(e) = self.hold_locked(&snapshot, false).await {
            warn!(destination = %name, error = %e, "could not hold destination");
        }
        for host in &snapshot.hosts {
            if let Err(e) = self.acquisition.stop_listing(&host.name).await {
                warn!(host = %host.name, error = %e, "could not interrupt acquisition");
            }
        }

        let now = Utc::now();
        let transfers = self.store.list_destination_transfers(name).await?;
        let mut batch = self.cleanup.start();
        let mut cleaned = Vec::new();
        for transfer in transfers.into_iter().filter(|t| {
            purge_all
                || t.expiry_time < now
                || matches!(t.status, TransferStatus::Stop | TransferStatus::Fail)
        }) {
            cleaned.push(transfer.id);
            let cleaner = self.cleaner();
            let actor = actor.to_string();
            batch
                .submit(format!("transfer {}", transfer.id), async move {
                    cleaner.clean(transfer.id, &actor, false).await.map(|_| ())
                })
                .await;
        }
        let cleanup = batch.drain().await;
        info!(
            destination = %name,
            cleaned = cleanup.succeeded,
            failed = cleanup.failed,
            "transfers cleaned"
        );

        let mut report = RemovalReport {
            cleanup,
            ..RemovalReport::default()
        };
        if clean_only {
            self.purge_cleaned(&cleaned).await;
            self.hooks
                .run(vec![
                    PostCommit::Reschedule(name.to_string()),
                    PostCommit::MonitoringWakeup,
                ])
                .await;
            return Ok(report);
        }

        for association in &snapshot.associations {
            let host = association.host.as_str();
            let shared = match self.store.list_host_destinations(host).await {
                Ok(destinations) => destinations.iter().any(|d| d != name),
                Err(e) => {
                    warn!(host = %host, error = %e, "could not check host sharing");
                    continue;
                }
            };
            let result = if shared {
                self.store
                    .remove_association(name, host)
                    .await
                    .map(|_| report.detached_hosts.push(host.to_string()))
            } else {
                self.store
                    .remove_host(host)
                    .await
                    .map(|_| report.removed_hosts.push(host.to_string()))
            };
            if let Err(e) = result {
                warn!(host = %host, shared, error = %e, "could not remove host");
            }
        }

        report.removed_permissions = match self.store.remove_incoming_permissions(name).await {
            Ok(count) => count,
            Err(e) => {
                warn!(destination = %name, error = %e, "could not remove incoming permissions");
                0
            }
        };

        if !self.store.remove_destination(name).await? {
            return Err(EcpdsError::NotFound(format!("destination {name}")));
        }
        report.destination_removed = true;
        record_transition("destination", "remove");
        info!(destination = %name, "destination removed");

        self.hooks
            .run(vec![PostCommit::InvalidateAll, PostCommit::MonitoringWakeup])
            .await;

        let attachments = self.attachments_dir.join(name);
        match tokio::fs::remove_dir_all(&attachments).await {
            Ok(()) => debug!(path = %attachments.display(), "attachments removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %attachments.display(), error = %e, "could not remove attachments"),
        }
        Ok(report)
    }

    /// Drop the rows of transfers a cleanup flagged as deleted. A transfer
    /// whose cleanup failed is still live and keeps its row.
    async fn purge_cleaned(&self, ids: &[TransferId]) {
        let mut purged = 0usize;
        for &id in ids {
            let key = id.to_string();
            let guard = self.transfer_locks.lock(&key).await;
            let result = match self.store.inner().get_data_transfer(id).await {
                Ok(Some(transfer)) if transfer.deleted => self.store.remove_data_transfer(id).await,
                Ok(_) => Ok(false),
                Err(e) => Err(e),
            };
            drop(guard);
            match result {
                Ok(true) => {
                    purged += 1;
                    self.transfer_locks.forget(&key);
                }
                Ok(false) => {}
                Err(e) => warn!(transfer = %id, error = %e, "could not purge cleaned transfer"),
            }
        }
        debug!(purged, "cleaned transfers purged");
    }

    /// Enable or disable a host for every destination using it.
    #[instrument(skip(self))]
    pub async fn set_host_active(
        &self,
        actor: &Principal,
        name: &str,
        active: bool,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let _guard = self.host_locks.lock(name).await;
            let mut host = self
                .store
                .get_host(name)
                .await?
                .ok_or_else(|| EcpdsError::NotFound(format!("host {name}")))?;
            if host.active != active {
                host.active = active;
                self.store.update_host(&host).await?;
                record_transition("host", "set_active");
                info!(host = %name, active, "host activation changed");
            }
            self.hooks.run(vec![PostCommit::MonitoringWakeup]).await;
            Ok(())
        }
        .await;
        self.finish(actor, "set_host_active", name.to_string(), started, result)
            .await
    }
}
