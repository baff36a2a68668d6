// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete master stack over the in-memory store:
//! cache layer, management service, ticket repository and proxy provider,
//! with every external collaborator mocked. `serve()` plays the part of the
//! mover so ticket flows can be driven without any network.

use std::sync::Arc;

use ecpds_cache::{CacheSettings, CachedStore};
use ecpds_core::types::{Principal, TransferId, TransferStatus};
use ecpds_core::{EcpdsError, SchedulerKind};
use ecpds_master::{Collaborators, ManagementService, MasterSettings};
use ecpds_proxy::{ProxyProvider, ProxySettings};
use ecpds_ticket::{Completion, ProxySocket, TicketRepository, TicketSettings};

use crate::fixtures;
use crate::memory_store::MemoryStore;
use crate::mock_collaborators::{MockMonitoring, RecordingAudit, ScriptedAuthorizer};
use crate::mock_mover::MockMover;
use crate::mock_scheduler::{MockDispatch, MockRetrievalScheduler};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    cache: CacheSettings,
    tickets: TicketSettings,
    cleanup_concurrency: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            cache: CacheSettings::default(),
            tickets: TicketSettings::default(),
            cleanup_concurrency: 4,
        }
    }

    pub fn with_cache_settings(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ticket_settings(mut self, tickets: TicketSettings) -> Self {
        self.tickets = tickets;
        self
    }

    pub fn with_cleanup_concurrency(mut self, concurrency: usize) -> Self {
        self.cleanup_concurrency = concurrency;
        self
    }

    /// Build the harness, creating all required subsystems.
    pub fn build(self) -> Result<TestHarness, EcpdsError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| EcpdsError::Storage { source: e.into() })?;
        let attachments_dir = temp_dir.path().join("attachments");

        let memory = Arc::new(MemoryStore::new());
        let store = Arc::new(CachedStore::new(memory.clone(), self.cache));
        let dispatch = Arc::new(MockDispatch::new());
        let ordinary = Arc::new(MockRetrievalScheduler::new(SchedulerKind::Ordinary));
        let acquisition = Arc::new(MockRetrievalScheduler::new(SchedulerKind::Acquisition));
        let monitoring = Arc::new(MockMonitoring::new());
        let audit = Arc::new(RecordingAudit::new());
        let authorizer = Arc::new(ScriptedAuthorizer::allow_all());
        let mover = Arc::new(MockMover::new());

        let master = Arc::new(ManagementService::new(
            Collaborators {
                store: store.clone(),
                dispatch: dispatch.clone(),
                ordinary: ordinary.clone(),
                acquisition: acquisition.clone(),
                monitoring: monitoring.clone(),
                audit: audit.clone(),
            },
            MasterSettings {
                cleanup_concurrency: self.cleanup_concurrency,
                cleanup_queue: self.cleanup_concurrency * 2,
                attachments_dir: attachments_dir.clone(),
            },
        ));
        let tickets = Arc::new(TicketRepository::new(self.tickets));
        let proxy = Arc::new(ProxyProvider::new(
            tickets.clone(),
            master.clone(),
            mover.clone(),
            authorizer.clone(),
            ProxySettings {
                attachments_dir,
                public_address: "127.0.0.1".to_string(),
                public_port: 9140,
            },
        ));

        Ok(TestHarness {
            memory,
            store,
            dispatch,
            ordinary,
            acquisition,
            monitoring,
            audit,
            authorizer,
            mover,
            master,
            tickets,
            proxy,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete master stack with mock collaborators and temp attachments.
pub struct TestHarness {
    /// Backing store, bypassing the caches.
    pub memory: Arc<MemoryStore>,
    pub store: Arc<CachedStore>,
    pub dispatch: Arc<MockDispatch>,
    pub ordinary: Arc<MockRetrievalScheduler>,
    pub acquisition: Arc<MockRetrievalScheduler>,
    pub monitoring: Arc<MockMonitoring>,
    pub audit: Arc<RecordingAudit>,
    pub authorizer: Arc<ScriptedAuthorizer>,
    pub mover: Arc<MockMover>,
    pub master: Arc<ManagementService>,
    pub tickets: Arc<TicketRepository>,
    pub proxy: Arc<ProxyProvider>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn admin() -> Principal {
        Principal::new("admin")
    }

    /// Seed a destination with a host, the `mover-1` server and one transfer.
    pub async fn seed(
        &self,
        destination: &str,
        target: &str,
        status: TransferStatus,
    ) -> Result<TransferId, EcpdsError> {
        fixtures::seed_destination(self.memory.as_ref(), destination, target, status).await
    }

    /// Act as the mover behind `socket`: redeem its ticket and report `completion`.
    pub fn serve(&self, socket: &ProxySocket, completion: Completion) -> Result<(), EcpdsError> {
        self.tickets.redeem(socket.ticket)?;
        self.tickets.complete(socket.ticket, completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_empty_environment() {
        let harness = TestHarness::builder().build().unwrap();
        assert!(harness.tickets.is_empty());
        assert_eq!(harness.monitoring.wakeups(), 0);
    }

    #[tokio::test]
    async fn seed_is_visible_through_the_cache() {
        let harness = TestHarness::builder().build().unwrap();
        harness
            .seed("DEST1", "a.bin", TransferStatus::Wait)
            .await
            .unwrap();
        let snapshot = harness
            .store
            .destination_snapshot("DEST1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.hosts.len(), 1);
        assert!(snapshot.host("dest1-host").is_some());
    }

    #[test]
    fn harnesses_use_separate_attachment_roots() {
        let h1 = TestHarness::builder().build().unwrap();
        let h2 = TestHarness::builder().build().unwrap();
        assert_ne!(
            h1.proxy.attachments().root(),
            h2.proxy.attachments().root()
        );
    }
}
