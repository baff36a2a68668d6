// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent store contract consumed by the control plane.
//!
//! The store is the single source of truth. Every method is a single
//! transactional step; inserts report primary-key collisions as
//! [`EcpdsError::AlreadyExists`].

use async_trait::async_trait;

use crate::error::EcpdsError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Association, Country, DataFile, DataFileId, DataTransfer, Destination, Host, TransferHistory,
    TransferId, TransferServer,
};

#[async_trait]
pub trait PersistentStore: PluginAdapter {
    // --- Destinations ---

    async fn get_destination(&self, name: &str) -> Result<Option<Destination>, EcpdsError>;

    async fn list_destinations(&self) -> Result<Vec<Destination>, EcpdsError>;

    async fn insert_destination(&self, destination: &Destination) -> Result<(), EcpdsError>;

    async fn update_destination(&self, destination: &Destination) -> Result<(), EcpdsError>;

    /// Removes the destination together with its transfers, associations and aliases.
    /// Returns `false` if nothing was removed.
    async fn remove_destination(&self, name: &str) -> Result<bool, EcpdsError>;

    async fn list_aliases(&self, destination: &str) -> Result<Vec<String>, EcpdsError>;

    async fn list_destination_users(&self, destination: &str) -> Result<Vec<String>, EcpdsError>;

    /// Drops every incoming permission granted on the destination.
    async fn remove_incoming_permissions(&self, destination: &str) -> Result<usize, EcpdsError>;

    // --- Hosts and movers ---

    async fn get_host(&self, name: &str) -> Result<Option<Host>, EcpdsError>;

    async fn list_hosts(&self) -> Result<Vec<Host>, EcpdsError>;

    async fn insert_host(&self, host: &Host) -> Result<(), EcpdsError>;

    async fn update_host(&self, host: &Host) -> Result<(), EcpdsError>;

    async fn remove_host(&self, name: &str) -> Result<bool, EcpdsError>;

    async fn insert_association(&self, association: &Association) -> Result<(), EcpdsError>;

    async fn remove_association(&self, destination: &str, host: &str) -> Result<bool, EcpdsError>;

    /// Associations of a destination, highest priority (lowest value) first.
    async fn list_associations(&self, destination: &str) -> Result<Vec<Association>, EcpdsError>;

    /// Destinations a host is associated with.
    async fn list_host_destinations(&self, host: &str) -> Result<Vec<String>, EcpdsError>;

    async fn get_transfer_server(&self, name: &str) -> Result<Option<TransferServer>, EcpdsError>;

    async fn list_transfer_servers(&self) -> Result<Vec<TransferServer>, EcpdsError>;

    async fn insert_transfer_server(&self, server: &TransferServer) -> Result<(), EcpdsError>;

    async fn list_countries(&self) -> Result<Vec<Country>, EcpdsError>;

    async fn insert_country(&self, country: &Country) -> Result<(), EcpdsError>;

    // --- Data files and transfers ---

    async fn get_data_file(&self, id: DataFileId) -> Result<Option<DataFile>, EcpdsError>;

    /// Inserts a data file; the id in `data_file` is ignored and the new one returned.
    async fn insert_data_file(&self, data_file: &DataFile) -> Result<DataFileId, EcpdsError>;

    async fn remove_data_file(&self, id: DataFileId) -> Result<bool, EcpdsError>;

    /// Returns the transfer even when it is flagged as deleted.
    async fn get_data_transfer(&self, id: TransferId) -> Result<Option<DataTransfer>, EcpdsError>;

    /// Inserts a transfer; the id in `transfer` is ignored and the new one returned.
    async fn insert_data_transfer(&self, transfer: &DataTransfer) -> Result<TransferId, EcpdsError>;

    async fn update_data_transfer(&self, transfer: &DataTransfer) -> Result<(), EcpdsError>;

    async fn remove_data_transfer(&self, id: TransferId) -> Result<bool, EcpdsError>;

    /// Transfers of a destination that are not flagged as deleted.
    async fn list_destination_transfers(
        &self,
        destination: &str,
    ) -> Result<Vec<DataTransfer>, EcpdsError>;

    /// Transfers of a data file that are not flagged as deleted.
    async fn list_data_file_transfers(
        &self,
        data_file_id: DataFileId,
    ) -> Result<Vec<DataTransfer>, EcpdsError>;

    async fn insert_transfer_history(&self, history: &TransferHistory) -> Result<(), EcpdsError>;

    async fn list_transfer_history(
        &self,
        transfer_id: TransferId,
    ) -> Result<Vec<TransferHistory>, EcpdsError>;
}
