// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative operations on single data transfers.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use ecpds_cache::CachedStore;
use ecpds_core::types::{DataTransfer, Principal, TransferHistory, TransferId, TransferStatus};
use ecpds_core::{EcpdsError, PersistentStore, RetrievalScheduler};

use crate::hooks::PostCommit;
use crate::locks::KeyedLocks;
use crate::recording::record_transition;
use crate::service::ManagementService;
use crate::transition::{Transition, TransitionKind, check_transition};

/// Highest (least urgent) transfer priority.
pub const MAX_PRIORITY: i32 = 99;

/// Stops a transfer, flags it deleted and purges its data file when orphaned.
///
/// Owns its collaborators so cleanup jobs can run on the worker pool. It
/// shares the service's transfer locks, so a job and a status update on the
/// same transfer never interleave.
#[derive(Clone)]
pub struct Cleaner {
    pub(crate) store: Arc<CachedStore>,
    pub(crate) ordinary: Arc<dyn RetrievalScheduler>,
    pub(crate) acquisition: Arc<dyn RetrievalScheduler>,
    pub(crate) locks: Arc<KeyedLocks>,
}

impl Cleaner {
    /// Clean one transfer under its lock. Cleaning an already deleted
    /// transfer is a no-op.
    pub async fn clean(
        &self,
        id: TransferId,
        actor: &str,
        interrupt: bool,
    ) -> Result<DataTransfer, EcpdsError> {
        let key = id.to_string();
        let guard = self.locks.lock(&key).await;
        let result = self.clean_locked(id, actor, interrupt).await;
        drop(guard);
        if result.is_ok() {
            self.locks.forget(&key);
        }
        result
    }

    async fn clean_locked(
        &self,
        id: TransferId,
        actor: &str,
        interrupt: bool,
    ) -> Result<DataTransfer, EcpdsError> {
        let mut transfer = self
            .store
            .inner()
            .get_data_transfer(id)
            .await?
            .ok_or_else(|| EcpdsError::NotFound(format!("transfer {id}")))?;
        if transfer.deleted {
            return Ok(transfer);
        }
        if interrupt && transfer.status.is_in_flight() {
            interrupt_both(&self.ordinary, &self.acquisition, id).await;
        }

        let now = Utc::now();
        transfer.status = TransferStatus::Stop;
        transfer.deleted = true;
        transfer.comment = format!("Cleaned by {actor}");
        self.store.update_data_transfer(&transfer).await?;
        record_transition("transfer", "clean");

        let history = TransferHistory {
            transfer_id: id,
            destination: transfer.destination.clone(),
            status: TransferStatus::Stop,
            comment: transfer.comment.clone(),
            actor: actor.to_string(),
            time: now,
        };
        if let Err(e) = self.store.insert_transfer_history(&history).await {
            warn!(transfer = %id, error = %e, "could not record cleanup history");
        }

        let remaining = self
            .store
            .list_data_file_transfers(transfer.data_file_id)
            .await?;
        if remaining.is_empty() {
            self.store.remove_data_file(transfer.data_file_id).await?;
            debug!(data_file = %transfer.data_file_id, "orphaned data file purged");
        }
        Ok(transfer)
    }
}

/// Ask both retrieval schedulers to cancel `id`. Errors count as "not running".
async fn interrupt_both(
    ordinary: &Arc<dyn RetrievalScheduler>,
    acquisition: &Arc<dyn RetrievalScheduler>,
    id: TransferId,
) -> bool {
    let mut found = false;
    for scheduler in [ordinary, acquisition] {
        match scheduler.interrupt(id).await {
            Ok(hit) => found |= hit,
            Err(e) => warn!(
                transfer = %id,
                scheduler = %scheduler.kind(),
                error = %e,
                "could not interrupt retrieval"
            ),
        }
    }
    found
}

impl ManagementService {
    /// The transfer as currently stored, bypassing the transfer cache.
    async fn live_transfer(&self, id: TransferId) -> Result<DataTransfer, EcpdsError> {
        self.store
            .inner()
            .get_data_transfer(id)
            .await?
            .filter(|t| !t.deleted)
            .ok_or_else(|| EcpdsError::NotFound(format!("transfer {id}")))
    }

    /// Dry run of [`ManagementService::update_transfer_status`]. Never writes.
    pub async fn transfer_status_update_allowed(
        &self,
        id: TransferId,
        status: TransferStatus,
        kind: TransitionKind,
    ) -> Result<bool, EcpdsError> {
        let transfer = self
            .store
            .get_data_transfer(id)
            .await?
            .filter(|t| !t.deleted)
            .ok_or_else(|| EcpdsError::NotFound(format!("transfer {id}")))?;
        match check_transition(transfer.status, status, kind) {
            Ok(_) => Ok(true),
            Err(EcpdsError::InvalidTransition(reason)) => {
                debug!(transfer = %id, %reason, "status update refused");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Move a transfer to `status`.
    ///
    /// With `commit == false` this only answers whether the transition is
    /// allowed. Returns whether the stored status changed.
    #[instrument(skip(self))]
    pub async fn update_transfer_status(
        &self,
        actor: &Principal,
        id: TransferId,
        status: TransferStatus,
        kind: TransitionKind,
        commit: bool,
    ) -> Result<bool, EcpdsError> {
        if !commit {
            return self.transfer_status_update_allowed(id, status, kind).await;
        }
        let started = Instant::now();
        let result: Result<bool, EcpdsError> = async {
            let _guard = self.transfer_locks.lock(&id.to_string()).await;
            let mut transfer = self.live_transfer(id).await?;
            let (interrupt, requeue) = match check_transition(transfer.status, status, kind)? {
                Transition::Unchanged => return Ok(false),
                Transition::Apply { interrupt, requeue } => (interrupt, requeue),
            };
            if interrupt {
                interrupt_both(&self.ordinary, &self.acquisition, id).await;
            }

            let now = Utc::now();
            let previous = transfer.status;
            transfer.status = status;
            match status {
                TransferStatus::Fail => transfer.failed_time = Some(now),
                TransferStatus::Done => transfer.finish_time = Some(now),
                TransferStatus::Retr => transfer.retry_time = Some(now),
                _ => {}
            }
            if requeue {
                transfer.queue_time = now;
            }
            self.store.update_data_transfer(&transfer).await?;
            record_transition("transfer", "update_status");
            info!(
                transfer = %id,
                from = previous.display_name(),
                to = status.display_name(),
                %kind,
                "transfer status changed"
            );

            self.hooks
                .run(vec![
                    PostCommit::History(TransferHistory {
                        transfer_id: id,
                        destination: transfer.destination.clone(),
                        status,
                        comment: format!("{previous} -> {status} ({kind})"),
                        actor: actor.to_string(),
                        time: now,
                    }),
                    PostCommit::Reschedule(transfer.destination.clone()),
                    PostCommit::MonitoringWakeup,
                ])
                .await;
            Ok(true)
        }
        .await;
        self.finish(actor, "update_status", id.to_string(), started, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_priority(
        &self,
        actor: &Principal,
        id: TransferId,
        priority: i32,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            if !(0..=MAX_PRIORITY).contains(&priority) {
                return Err(EcpdsError::InvalidTransition(format!(
                    "priority {priority} outside [0,{MAX_PRIORITY}]"
                )));
            }
            let _guard = self.transfer_locks.lock(&id.to_string()).await;
            let mut transfer = self.live_transfer(id).await?;
            if transfer.priority == priority {
                return Ok(());
            }
            transfer.priority = priority;
            self.store.update_data_transfer(&transfer).await?;
            record_transition("transfer", "update_priority");
            self.hooks
                .run(vec![
                    PostCommit::Reschedule(transfer.destination.clone()),
                    PostCommit::MonitoringWakeup,
                ])
                .await;
            Ok(())
        }
        .await;
        self.finish(actor, "update_priority", id.to_string(), started, result)
            .await
    }

    /// Extend the expiry of a transfer. Moving it earlier is refused.
    #[instrument(skip(self))]
    pub async fn update_expiry(
        &self,
        actor: &Principal,
        id: TransferId,
        expiry: DateTime<Utc>,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let _guard = self.transfer_locks.lock(&id.to_string()).await;
            let mut transfer = self.live_transfer(id).await?;
            if expiry < transfer.expiry_time {
                return Err(EcpdsError::InvalidTransition(format!(
                    "expiry {expiry} is earlier than {}",
                    transfer.expiry_time
                )));
            }
            transfer.expiry_time = expiry;
            self.store.update_data_transfer(&transfer).await?;
            record_transition("transfer", "update_expiry");
            self.hooks.run(vec![PostCommit::MonitoringWakeup]).await;
            Ok(())
        }
        .await;
        self.finish(actor, "update_expiry", id.to_string(), started, result)
            .await
    }

    /// Cancel an in-flight retrieval. Returns whether either scheduler had it.
    #[instrument(skip(self))]
    pub async fn interrupt(&self, actor: &Principal, id: TransferId) -> Result<bool, EcpdsError> {
        let started = Instant::now();
        let found = interrupt_both(&self.ordinary, &self.acquisition, id).await;
        debug!(transfer = %id, found, "interrupt requested");
        self.finish(actor, "interrupt", id.to_string(), started, Ok(found))
            .await
    }

    /// Put a transfer at the head of its queue now.
    #[instrument(skip(self))]
    pub async fn reset_transfer_schedule_date(
        &self,
        actor: &Principal,
        id: TransferId,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let _guard = self.transfer_locks.lock(&id.to_string()).await;
            let mut transfer = self.live_transfer(id).await?;
            let now = Utc::now();
            transfer.queue_time = now;
            transfer.retry_time = Some(now);
            transfer.comment = format!("Manually scheduled by {actor}");
            self.store.update_data_transfer(&transfer).await?;
            record_transition("transfer", "reschedule");
            self.hooks
                .run(vec![
                    PostCommit::History(TransferHistory {
                        transfer_id: id,
                        destination: transfer.destination.clone(),
                        status: transfer.status,
                        comment: transfer.comment.clone(),
                        actor: actor.to_string(),
                        time: now,
                    }),
                    PostCommit::Reschedule(transfer.destination.clone()),
                    PostCommit::MonitoringWakeup,
                ])
                .await;
            Ok(())
        }
        .await;
        self.finish(actor, "reschedule", id.to_string(), started, result)
            .await
    }

    /// Stop and delete a transfer, purging its data file when nothing else uses it.
    #[instrument(skip(self))]
    pub async fn clean_data_transfer(
        &self,
        actor: &Principal,
        id: TransferId,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let transfer = self.cleaner().clean(id, actor.as_str(), true).await?;
            self.hooks
                .run(vec![
                    PostCommit::Reschedule(transfer.destination),
                    PostCommit::MonitoringWakeup,
                ])
                .await;
            Ok(())
        }
        .await;
        self.finish(actor, "clean", id.to_string(), started, result)
            .await
    }
}
