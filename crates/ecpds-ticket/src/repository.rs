// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory ticket repository.
//!
//! A ticket moves through `Pending -> Redeemed -> Done` (or `Cancelled`).
//! Completion is published on a per-ticket `watch` channel so a checker that
//! subscribes late still observes it, and `check` waits on that channel under
//! `tokio::time::timeout` instead of polling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ecpds_config::model::TicketConfig;
use ecpds_core::{EcpdsError, TicketId};

use crate::ticket::{Completion, Ticket, TicketDescriptor};

/// Timeouts governing ticket lifetime.
#[derive(Debug, Clone, Copy)]
pub struct TicketSettings {
    /// Bound used by [`TicketRepository::check`] when the caller gives none.
    pub check_timeout: Duration,
    /// Lifetime of a ticket that never completes.
    pub ticket_timeout: Duration,
    /// Grace period for completed tickets nobody checked.
    pub timeout_after_completion: Duration,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self::from(&TicketConfig::default())
    }
}

impl From<&TicketConfig> for TicketSettings {
    fn from(config: &TicketConfig) -> Self {
        Self {
            check_timeout: config.check_timeout(),
            ticket_timeout: config.ticket_timeout(),
            timeout_after_completion: config.timeout_after_completion(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TicketState {
    Pending,
    Redeemed,
    Done {
        completion: Completion,
        at: Instant,
    },
    Cancelled,
}

impl TicketState {
    fn is_final(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Cancelled)
    }
}

struct Slot {
    ticket: Ticket,
    state: watch::Sender<TicketState>,
    /// Set by the single consumer allowed to `check` this ticket.
    checking: AtomicBool,
}

/// Result of a successful [`TicketRepository::check`].
#[derive(Debug, Clone)]
pub struct CheckedTicket {
    pub ticket: Ticket,
    pub completion: Completion,
}

/// Issues, tracks and expires tickets.
pub struct TicketRepository {
    tickets: DashMap<TicketId, Arc<Slot>>,
    next_id: AtomicU64,
    settings: TicketSettings,
}

impl TicketRepository {
    pub fn new(settings: TicketSettings) -> Self {
        // Seeding from the clock keeps ids unique across restarts of the master.
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(1) * 1_000;
        Self {
            tickets: DashMap::new(),
            next_id: AtomicU64::new(seed),
            settings,
        }
    }

    pub fn settings(&self) -> TicketSettings {
        self.settings
    }

    /// Number of live tickets.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Register a ticket for a resolved resource.
    pub fn add(&self, descriptor: TicketDescriptor) -> Ticket {
        let id = TicketId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let lifetime = descriptor
            .timeout
            .map_or(self.settings.ticket_timeout, |t| {
                t.min(self.settings.ticket_timeout)
            });
        let ticket = Ticket {
            id,
            target: descriptor.target,
            direction: descriptor.direction,
            offset: descriptor.offset,
            length: descriptor.length,
            umask: descriptor.umask,
            created_at: Utc::now(),
            deadline: Instant::now() + lifetime,
        };
        let (state, _) = watch::channel(TicketState::Pending);
        self.tickets.insert(
            id,
            Arc::new(Slot {
                ticket: ticket.clone(),
                state,
                checking: AtomicBool::new(false),
            }),
        );

        metrics::counter!("ecpds_tickets_issued_total", "direction" => ticket.direction.to_string())
            .increment(1);
        debug!(
            ticket = %id,
            direction = %ticket.direction,
            scope = ticket.target.scope(),
            path = ticket.target.path(),
            "ticket issued"
        );
        ticket
    }

    fn slot(&self, id: TicketId) -> Result<Arc<Slot>, EcpdsError> {
        self.tickets
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EcpdsError::TicketNotFound { id: id.0 })
    }

    /// Look a ticket up without consuming it.
    pub fn get(&self, id: TicketId) -> Result<Ticket, EcpdsError> {
        Ok(self.slot(id)?.ticket.clone())
    }

    /// Claim a ticket for I/O. Succeeds at most once per ticket.
    pub fn redeem(&self, id: TicketId) -> Result<Ticket, EcpdsError> {
        let slot = self.slot(id)?;
        if slot.ticket.is_expired(Instant::now()) {
            self.discard(id);
            return Err(EcpdsError::TicketExpired { id: id.0 });
        }
        let claimed = slot.state.send_if_modified(|state| {
            if *state == TicketState::Pending {
                *state = TicketState::Redeemed;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(EcpdsError::TicketNotFound { id: id.0 });
        }
        debug!(ticket = %id, "ticket redeemed");
        Ok(slot.ticket.clone())
    }

    /// Report the end of the I/O authorized by a ticket.
    pub fn complete(&self, id: TicketId, completion: Completion) -> Result<(), EcpdsError> {
        let slot = self.slot(id)?;
        let accepted = slot.state.send_if_modified(|state| match state {
            TicketState::Pending | TicketState::Redeemed => {
                *state = TicketState::Done {
                    completion: completion.clone(),
                    at: Instant::now(),
                };
                true
            }
            _ => false,
        });
        if !accepted {
            return Err(EcpdsError::TicketNotFound { id: id.0 });
        }
        debug!(ticket = %id, ?completion, "ticket completed");
        Ok(())
    }

    /// Wait until the party performing the I/O reports completion.
    ///
    /// The wait is bounded by `timeout` (or the configured default) and by the
    /// ticket's own deadline. Whatever the result, the ticket is gone afterwards:
    /// a second check fails with [`EcpdsError::TicketNotFound`].
    pub async fn check(
        &self,
        id: TicketId,
        timeout: Option<Duration>,
    ) -> Result<CheckedTicket, EcpdsError> {
        let slot = self.slot(id)?;
        if slot.checking.swap(true, Ordering::AcqRel) {
            return Err(EcpdsError::TicketNotFound { id: id.0 });
        }

        let bound = timeout
            .unwrap_or(self.settings.check_timeout)
            .min(slot.ticket.remaining(Instant::now()));
        let mut rx = slot.state.subscribe();
        let waited = tokio::time::timeout(bound, async {
            rx.wait_for(TicketState::is_final)
                .await
                .map(|state| (*state).clone())
        })
        .await;
        self.discard(id);

        let outcome = match waited {
            Ok(Ok(TicketState::Done { completion, .. })) => match completion {
                Completion::Failed { reason } => Err(EcpdsError::transient(format!(
                    "transfer for ticket {id} failed: {reason}"
                ))),
                succeeded => Ok(CheckedTicket {
                    ticket: slot.ticket.clone(),
                    completion: succeeded,
                }),
            },
            Ok(_) => Err(EcpdsError::TicketNotFound { id: id.0 }),
            Err(_) => Err(EcpdsError::TicketExpired { id: id.0 }),
        };

        let label = match &outcome {
            Ok(_) => "completed",
            Err(e) => e.kind(),
        };
        metrics::counter!("ecpds_tickets_checked_total", "outcome" => label).increment(1);
        match &outcome {
            Ok(_) => debug!(ticket = %id, "ticket checked"),
            Err(e) => warn!(ticket = %id, error = %e, "ticket check failed"),
        }
        outcome
    }

    /// Cancel a ticket, releasing any checker with [`EcpdsError::TicketNotFound`].
    pub fn remove(&self, id: TicketId) -> bool {
        let removed = self.discard(id);
        if removed {
            debug!(ticket = %id, "ticket removed");
        }
        removed
    }

    fn discard(&self, id: TicketId) -> bool {
        match self.tickets.remove(&id) {
            Some((_, slot)) => {
                slot.state.send_if_modified(|state| {
                    if state.is_final() {
                        false
                    } else {
                        *state = TicketState::Cancelled;
                        true
                    }
                });
                true
            }
            None => false,
        }
    }

    /// Drop unchecked tickets past their deadline and completed tickets past
    /// the post-completion grace period. Returns how many were removed.
    pub fn reap(&self) -> usize {
        let now = Instant::now();
        let grace = self.settings.timeout_after_completion;
        let stale: Vec<TicketId> = self
            .tickets
            .iter()
            .filter(|entry| {
                let slot = entry.value();
                if slot.checking.load(Ordering::Acquire) {
                    return false;
                }
                match &*slot.state.borrow() {
                    TicketState::Done { at, .. } => now.saturating_duration_since(*at) >= grace,
                    TicketState::Cancelled => true,
                    _ => slot.ticket.is_expired(now),
                }
            })
            .map(|entry| *entry.key())
            .collect();

        let reaped = stale.into_iter().filter(|id| self.discard(*id)).count();
        if reaped > 0 {
            info!(count = reaped, remaining = self.len(), "reaped stale tickets");
        }
        reaped
    }

    /// Run [`TicketRepository::reap`] every `interval` until `cancel` fires.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let repository = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("ticket reaper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        repository.reap();
                    }
                }
            }
        })
    }
}

impl Default for TicketRepository {
    fn default() -> Self {
        Self::new(TicketSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::ticket::TicketTarget;

    fn attachment(path: &str) -> TicketDescriptor {
        TicketDescriptor::read(
            TicketTarget::Attachment {
                scope: "DEST1".into(),
                path: path.into(),
            },
            0,
        )
    }

    fn settings() -> TicketSettings {
        TicketSettings {
            check_timeout: Duration::from_secs(20 * 60),
            ticket_timeout: Duration::from_secs(60 * 60),
            timeout_after_completion: Duration::from_secs(180),
        }
    }

    fn done() -> Completion {
        Completion::Succeeded {
            bytes: 10,
            data_file: None,
        }
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let repo = TicketRepository::new(settings());
        let a = repo.add(attachment("a"));
        let b = repo.add(attachment("b"));
        assert!(b.id > a.id);
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn descriptor_timeout_never_extends_lifetime() {
        let repo = TicketRepository::new(settings());
        let now = Instant::now();
        let ticket = repo.add(attachment("a").with_timeout(Duration::from_secs(999_999)));
        assert!(ticket.deadline <= now + Duration::from_secs(60 * 60) + Duration::from_secs(1));
    }

    #[test]
    fn redeem_is_exactly_once() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a"));
        repo.redeem(ticket.id).expect("first redeem");
        assert!(matches!(
            repo.redeem(ticket.id),
            Err(EcpdsError::TicketNotFound { .. })
        ));
    }

    #[test]
    fn complete_twice_is_rejected() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a"));
        repo.complete(ticket.id, done()).expect("first completion");
        assert!(matches!(
            repo.complete(ticket.id, done()),
            Err(EcpdsError::TicketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let repo = TicketRepository::new(settings());
        let err = repo.check(TicketId(1), None).await.unwrap_err();
        assert!(matches!(err, EcpdsError::TicketNotFound { id: 1 }));
    }

    #[tokio::test]
    async fn completion_before_check_is_observed() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a"));
        repo.redeem(ticket.id).unwrap();
        repo.complete(ticket.id, done()).unwrap();
        let checked = repo.check(ticket.id, None).await.expect("check succeeds");
        assert_eq!(checked.completion, done());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn failed_completion_is_transient() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a"));
        repo.complete(
            ticket.id,
            Completion::Failed {
                reason: "disk full".into(),
            },
        )
        .unwrap();
        let err = repo.check(ticket.id, None).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test(start_paused = true)]
    async fn check_times_out_with_ticket_expired() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a"));
        let err = repo
            .check(ticket.id, Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, EcpdsError::TicketExpired { .. }));
        assert!(repo.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ticket_deadline_bounds_the_wait() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a").with_timeout(Duration::from_secs(2)));
        let started = Instant::now();
        let err = repo.check(ticket.id, None).await.unwrap_err();
        assert!(matches!(err, EcpdsError::TicketExpired { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn redeem_after_deadline_is_expired() {
        let repo = TicketRepository::new(settings());
        let ticket = repo.add(attachment("a").with_timeout(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(
            repo.redeem(ticket.id),
            Err(EcpdsError::TicketExpired { .. })
        ));
        assert!(matches!(
            repo.redeem(ticket.id),
            Err(EcpdsError::TicketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_second_checker_is_rejected() {
        let repo = Arc::new(TicketRepository::new(settings()));
        let ticket = repo.add(attachment("a"));
        let first = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.check(ticket.id, None).await })
        };
        tokio::task::yield_now().await;
        // Give the first checker time to claim the ticket.
        while !repo
            .tickets
            .get(&ticket.id)
            .map(|s| s.checking.load(Ordering::Acquire))
            .unwrap_or(true)
        {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            repo.check(ticket.id, None).await,
            Err(EcpdsError::TicketNotFound { .. })
        ));
        repo.complete(ticket.id, done()).unwrap();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn remove_releases_waiting_checker() {
        let repo = Arc::new(TicketRepository::new(settings()));
        let ticket = repo.add(attachment("a"));
        let waiter = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.check(ticket.id, None).await })
        };
        while !repo
            .tickets
            .get(&ticket.id)
            .map(|s| s.checking.load(Ordering::Acquire))
            .unwrap_or(true)
        {
            tokio::task::yield_now().await;
        }
        assert!(repo.remove(ticket.id));
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, EcpdsError::TicketNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn reap_drops_expired_and_stale_completed() {
        let repo = TicketRepository::new(settings());
        let expired = repo.add(attachment("a").with_timeout(Duration::from_secs(10)));
        let completed = repo.add(attachment("b"));
        let fresh = repo.add(attachment("c"));
        repo.complete(completed.id, done()).unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(repo.reap(), 1);
        assert!(repo.get(expired.id).is_err());

        tokio::time::advance(Duration::from_secs(180)).await;
        assert_eq!(repo.reap(), 1);
        assert!(repo.get(completed.id).is_err());
        assert!(repo.get(fresh.id).is_ok());
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn reaper_task_expires_tickets_until_cancelled() {
        let repo = Arc::new(TicketRepository::new(TicketSettings {
            check_timeout: Duration::from_secs(30),
            ticket_timeout: Duration::from_secs(120),
            timeout_after_completion: Duration::from_secs(10),
        }));
        let ticket = repo.add(attachment("a"));
        let cancel = CancellationToken::new();
        let handle = repo.spawn_reaper(Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(repo.get(ticket.id).is_err());
        assert!(logs_contain("reaped stale tickets"));

        cancel.cancel();
        handle.await.unwrap();
        assert!(logs_contain("ticket reaper stopped"));
    }
}
