// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote mover node interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EcpdsError;
use crate::types::{
    DataFileId, Direction, FileListElement, Host, MoverEndpoint, TicketId, TransferServer,
};

/// Everything a mover needs to serve one ticket.
#[derive(Debug, Clone)]
pub struct MoverRequest {
    pub ticket: TicketId,
    pub direction: Direction,
    /// Remote host the mover talks to; `None` for data files held by the mover itself.
    pub host: Option<Host>,
    pub path: String,
    pub data_file: Option<DataFileId>,
    pub offset: u64,
    pub length: Option<u64>,
    pub umask: Option<u32>,
}

/// File operations performed by a mover on behalf of the master.
///
/// Byte-moving calls ([`MoverAdapter::prepare`]) are only made once a ticket
/// has been issued; the mover redeems it directly with the ticket repository.
#[async_trait]
pub trait MoverAdapter: Send + Sync + 'static {
    /// Registers the ticket with the mover and returns where the client must connect.
    async fn prepare(
        &self,
        server: &TransferServer,
        request: MoverRequest,
    ) -> Result<MoverEndpoint, EcpdsError>;

    async fn list(
        &self,
        server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<Vec<FileListElement>, EcpdsError>;

    async fn size(
        &self,
        server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<u64, EcpdsError>;

    async fn modified(
        &self,
        server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<DateTime<Utc>, EcpdsError>;

    async fn delete(
        &self,
        server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<(), EcpdsError>;

    async fn rename(
        &self,
        server: &TransferServer,
        host: &Host,
        source: &str,
        target: &str,
    ) -> Result<(), EcpdsError>;

    /// Whether directory operations are exposed for this host.
    fn supports_directories(&self, _host: &Host) -> bool {
        false
    }

    async fn mkdir(
        &self,
        _server: &TransferServer,
        host: &Host,
        _path: &str,
    ) -> Result<(), EcpdsError> {
        Err(EcpdsError::PermissionDenied(format!(
            "directories not exposed on host {}",
            host.name
        )))
    }

    async fn rmdir(
        &self,
        _server: &TransferServer,
        host: &Host,
        _path: &str,
    ) -> Result<(), EcpdsError> {
        Err(EcpdsError::PermissionDenied(format!(
            "directories not exposed on host {}",
            host.name
        )))
    }
}
