// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool for bulk transfer cleanup.
//!
//! At most `concurrency` jobs run at once and at most `queue` more wait for a
//! slot; `submit` applies backpressure beyond that. A batch must be drained,
//! which waits for every submitted job, before its report is available.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use ecpds_core::EcpdsError;

/// Concurrency window shared by every batch started from it.
#[derive(Debug, Clone, Copy)]
pub struct CleanupPool {
    concurrency: usize,
    queue: usize,
}

impl CleanupPool {
    pub fn new(concurrency: usize, queue: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            queue,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn start(&self) -> CleanupBatch {
        CleanupBatch {
            running: Arc::new(Semaphore::new(self.concurrency)),
            admitted: Arc::new(Semaphore::new(self.concurrency + self.queue)),
            jobs: JoinSet::new(),
            submitted: 0,
        }
    }
}

/// Counts of a drained batch. Individual failures are only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct CleanupBatch {
    running: Arc<Semaphore>,
    admitted: Arc<Semaphore>,
    jobs: JoinSet<bool>,
    submitted: usize,
}

impl CleanupBatch {
    /// Queue a job, waiting while the window and the queue are both full.
    pub async fn submit<F>(&mut self, label: String, job: F)
    where
        F: Future<Output = Result<(), EcpdsError>> + Send + 'static,
    {
        let Ok(admission) = Arc::clone(&self.admitted).acquire_owned().await else {
            warn!(item = %label, "cleanup pool closed, job dropped");
            return;
        };
        let running = Arc::clone(&self.running);
        self.submitted += 1;
        self.jobs.spawn(async move {
            let _admission = admission;
            let _slot = running.acquire_owned().await;
            match job.await {
                Ok(()) => {
                    debug!(item = %label, "cleaned");
                    true
                }
                Err(e) => {
                    warn!(item = %label, error = %e, "cleanup failed");
                    false
                }
            }
        });
    }

    /// Wait for every submitted job.
    pub async fn drain(mut self) -> CleanupReport {
        let mut report = CleanupReport {
            submitted: self.submitted,
            ..CleanupReport::default()
        };
        while let Some(joined) = self.jobs.join_next().await {
            match joined {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!(error = %e, "cleanup job aborted");
                    report.failed += 1;
                }
            }
        }
        metrics::counter!("ecpds_cleanup_items_total", "outcome" => "succeeded")
            .increment(report.succeeded as u64);
        metrics::counter!("ecpds_cleanup_items_total", "outcome" => "failed")
            .increment(report.failed as u64);
        report
    }
}
