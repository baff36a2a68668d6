// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators used when the master runs without movers or schedulers.
//!
//! They answer the way an unreachable peer would, so every operation still
//! completes with its best-effort steps logged as failures.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ecpds_config::model::AccessConfig;
use ecpds_core::traits::mover::MoverRequest;
use ecpds_core::types::{
    FileListElement, Host, MoverEndpoint, Principal, Resource, TransferId, TransferServer,
};
use ecpds_core::{
    Authorizer, DispatchScheduler, EcpdsError, MonitoringAdapter, MoverAdapter,
    RetrievalScheduler, SchedulerKind,
};

/// A retrieval scheduler that was never started.
pub struct DetachedScheduler {
    kind: SchedulerKind,
}

impl DetachedScheduler {
    pub fn new(kind: SchedulerKind) -> Self {
        Self { kind }
    }

    fn not_started(&self) -> EcpdsError {
        EcpdsError::transient(format!("{} scheduler not started", self.kind))
    }
}

#[async_trait]
impl RetrievalScheduler for DetachedScheduler {
    fn kind(&self) -> SchedulerKind {
        self.kind
    }

    async fn interrupt(&self, _transfer: TransferId) -> Result<bool, EcpdsError> {
        Err(self.not_started())
    }

    async fn interrupt_destination(&self, _destination: &str) -> Result<usize, EcpdsError> {
        Err(self.not_started())
    }

    async fn stop_listing(&self, _host: &str) -> Result<(), EcpdsError> {
        Err(self.not_started())
    }
}

pub struct DetachedDispatch;

#[async_trait]
impl DispatchScheduler for DetachedDispatch {
    async fn reschedule(&self, _destination: &str) -> Result<(), EcpdsError> {
        Err(EcpdsError::transient("transfer scheduler not started"))
    }

    async fn shutdown_destination(
        &self,
        _destination: &str,
        _graceful: bool,
    ) -> Result<(), EcpdsError> {
        Err(EcpdsError::transient("transfer scheduler not started"))
    }
}

pub struct InactiveMonitoring;

#[async_trait]
impl MonitoringAdapter for InactiveMonitoring {
    fn is_activated(&self) -> bool {
        false
    }

    async fn wakeup(&self) -> Result<(), EcpdsError> {
        Ok(())
    }
}

/// A mover that cannot be reached.
pub struct DetachedMover;

impl DetachedMover {
    fn unreachable(server: &TransferServer) -> EcpdsError {
        EcpdsError::transient(format!("mover {} not reachable", server.name))
    }
}

#[async_trait]
impl MoverAdapter for DetachedMover {
    async fn prepare(
        &self,
        server: &TransferServer,
        _request: MoverRequest,
    ) -> Result<MoverEndpoint, EcpdsError> {
        Err(Self::unreachable(server))
    }

    async fn list(
        &self,
        server: &TransferServer,
        _host: &Host,
        _path: &str,
    ) -> Result<Vec<FileListElement>, EcpdsError> {
        Err(Self::unreachable(server))
    }

    async fn size(
        &self,
        server: &TransferServer,
        _host: &Host,
        _path: &str,
    ) -> Result<u64, EcpdsError> {
        Err(Self::unreachable(server))
    }

    async fn modified(
        &self,
        server: &TransferServer,
        _host: &Host,
        _path: &str,
    ) -> Result<DateTime<Utc>, EcpdsError> {
        Err(Self::unreachable(server))
    }

    async fn delete(
        &self,
        server: &TransferServer,
        _host: &Host,
        _path: &str,
    ) -> Result<(), EcpdsError> {
        Err(Self::unreachable(server))
    }

    async fn rename(
        &self,
        server: &TransferServer,
        _host: &Host,
        _source: &str,
        _target: &str,
    ) -> Result<(), EcpdsError> {
        Err(Self::unreachable(server))
    }
}

/// Authorization driven by the `[access]` section.
pub struct ConfigAuthorizer {
    default_allow: bool,
    denied_destinations: HashSet<String>,
    admins: HashSet<String>,
}

impl ConfigAuthorizer {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            default_allow: config.default_allow,
            denied_destinations: config.denied_destinations.iter().cloned().collect(),
            admins: config.admins.iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for ConfigAuthorizer {
    async fn is_authorized(
        &self,
        principal: &Principal,
        resource: &Resource,
    ) -> Result<bool, EcpdsError> {
        if self.admins.contains(principal.as_str()) {
            return Ok(true);
        }
        if let Resource::Destination(name) = resource {
            if self.denied_destinations.contains(name) {
                return Ok(false);
            }
        }
        Ok(self.default_allow)
    }
}
