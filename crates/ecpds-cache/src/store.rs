// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `PersistentStore` decorator serving reads from the caches.
//!
//! Every write is delegated first and then invalidates the affected keys
//! before returning, which gives read-your-writes within the process.
//! Writes made by other processes become visible once the freshness window
//! of the cached entry runs out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ecpds_core::traits::adapter::PluginAdapter;
use ecpds_core::traits::store::PersistentStore;
use ecpds_core::types::{
    AdapterType, Association, Country, DataFile, DataFileId, DataTransfer, Destination,
    HealthStatus, Host, TransferHistory, TransferId, TransferServer,
};
use ecpds_core::EcpdsError;

use crate::CacheSettings;
use crate::snapshot::{DestinationSnapshot, MonitoringSnapshot};
use crate::transfer::TransferCache;
use crate::ttl::TtlCache;

pub struct CachedStore {
    inner: Arc<dyn PersistentStore>,
    destinations: TtlCache<String, DestinationSnapshot>,
    monitoring: TtlCache<String, MonitoringSnapshot>,
    transfer: TransferCache,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn PersistentStore>, settings: CacheSettings) -> Self {
        Self {
            inner,
            destinations: TtlCache::new("destination", settings.destination_ttl),
            monitoring: TtlCache::new("monitoring", settings.monitoring_ttl),
            transfer: TransferCache::new(settings.transfer_ttl),
        }
    }

    /// The uncached store.
    pub fn inner(&self) -> &Arc<dyn PersistentStore> {
        &self.inner
    }

    pub async fn destination_snapshot(
        &self,
        name: &str,
    ) -> Result<Option<Arc<DestinationSnapshot>>, EcpdsError> {
        let key = name.to_string();
        if let Some(hit) = self.destinations.get(&key) {
            return Ok(Some(hit));
        }
        let population = self.destinations.begin(key);
        Ok(DestinationSnapshot::load(self.inner.as_ref(), name)
            .await?
            .map(|snapshot| self.destinations.complete(population, snapshot)))
    }

    pub async fn monitoring_snapshot(
        &self,
        name: &str,
    ) -> Result<Option<Arc<MonitoringSnapshot>>, EcpdsError> {
        let key = name.to_string();
        if let Some(hit) = self.monitoring.get(&key) {
            return Ok(Some(hit));
        }
        let population = self.monitoring.begin(key);
        Ok(MonitoringSnapshot::load(self.inner.as_ref(), name)
            .await?
            .map(|snapshot| self.monitoring.complete(population, snapshot)))
    }

    pub fn invalidate_destination(&self, name: &str) {
        let key = name.to_string();
        self.destinations.invalidate(&key);
        self.monitoring.invalidate(&key);
    }

    /// Drop every destination snapshot after a write to `host`.
    ///
    /// A snapshot still loading has no stored entry to match against the
    /// host, so the whole destination cache moves to a new epoch and any
    /// population begun before the write is discarded.
    fn invalidate_host(&self, host: &str) {
        self.destinations.invalidate_all();
        debug!(host, "destination snapshots invalidated by host write");
    }

    fn invalidate_transfer(&self, transfer: &DataTransfer) {
        self.transfer.invalidate(transfer.id);
        self.invalidate_destination(&transfer.destination);
    }

    /// Forget everything; the next reads go to the store.
    pub fn clear(&self) {
        self.destinations.invalidate_all();
        self.monitoring.invalidate_all();
        self.transfer.clear();
        debug!("caches cleared");
    }
}

#[async_trait]
impl PluginAdapter for CachedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, EcpdsError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), EcpdsError> {
        self.clear();
        self.inner.shutdown().await
    }
}

#[async_trait]
impl PersistentStore for CachedStore {
    async fn get_destination(&self, name: &str) -> Result<Option<Destination>, EcpdsError> {
        Ok(self
            .destination_snapshot(name)
            .await?
            .map(|snapshot| snapshot.destination.clone()))
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, EcpdsError> {
        self.inner.list_destinations().await
    }

    async fn insert_destination(&self, destination: &Destination) -> Result<(), EcpdsError> {
        self.inner.insert_destination(destination).await?;
        self.invalidate_destination(&destination.name);
        Ok(())
    }

    async fn update_destination(&self, destination: &Destination) -> Result<(), EcpdsError> {
        let result = self.inner.update_destination(destination).await;
        self.invalidate_destination(&destination.name);
        result
    }

    async fn remove_destination(&self, name: &str) -> Result<bool, EcpdsError> {
        let result = self.inner.remove_destination(name).await;
        self.clear();
        result
    }

    async fn list_aliases(&self, destination: &str) -> Result<Vec<String>, EcpdsError> {
        Ok(self
            .destination_snapshot(destination)
            .await?
            .map(|snapshot| snapshot.aliases.clone())
            .unwrap_or_default())
    }

    async fn list_destination_users(&self, destination: &str) -> Result<Vec<String>, EcpdsError> {
        Ok(self
            .destination_snapshot(destination)
            .await?
            .map(|snapshot| snapshot.users.clone())
            .unwrap_or_default())
    }

    async fn remove_incoming_permissions(&self, destination: &str) -> Result<usize, EcpdsError> {
        let result = self.inner.remove_incoming_permissions(destination).await;
        self.invalidate_destination(destination);
        result
    }

    async fn get_host(&self, name: &str) -> Result<Option<Host>, EcpdsError> {
        self.inner.get_host(name).await
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, EcpdsError> {
        self.inner.list_hosts().await
    }

    async fn insert_host(&self, host: &Host) -> Result<(), EcpdsError> {
        self.inner.insert_host(host).await?;
        self.invalidate_host(&host.name);
        Ok(())
    }

    async fn update_host(&self, host: &Host) -> Result<(), EcpdsError> {
        let result = self.inner.update_host(host).await;
        self.invalidate_host(&host.name);
        result
    }

    async fn remove_host(&self, name: &str) -> Result<bool, EcpdsError> {
        let result = self.inner.remove_host(name).await;
        self.clear();
        result
    }

    async fn insert_association(&self, association: &Association) -> Result<(), EcpdsError> {
        self.inner.insert_association(association).await?;
        self.invalidate_destination(&association.destination);
        Ok(())
    }

    async fn remove_association(&self, destination: &str, host: &str) -> Result<bool, EcpdsError> {
        let result = self.inner.remove_association(destination, host).await;
        self.invalidate_destination(destination);
        result
    }

    async fn list_associations(&self, destination: &str) -> Result<Vec<Association>, EcpdsError> {
        Ok(self
            .destination_snapshot(destination)
            .await?
            .map(|snapshot| snapshot.associations.clone())
            .unwrap_or_default())
    }

    async fn list_host_destinations(&self, host: &str) -> Result<Vec<String>, EcpdsError> {
        self.inner.list_host_destinations(host).await
    }

    async fn get_transfer_server(&self, name: &str) -> Result<Option<TransferServer>, EcpdsError> {
        self.inner.get_transfer_server(name).await
    }

    async fn list_transfer_servers(&self) -> Result<Vec<TransferServer>, EcpdsError> {
        self.inner.list_transfer_servers().await
    }

    async fn insert_transfer_server(&self, server: &TransferServer) -> Result<(), EcpdsError> {
        self.inner.insert_transfer_server(server).await
    }

    async fn list_countries(&self) -> Result<Vec<Country>, EcpdsError> {
        self.inner.list_countries().await
    }

    async fn insert_country(&self, country: &Country) -> Result<(), EcpdsError> {
        self.inner.insert_country(country).await
    }

    async fn get_data_file(&self, id: DataFileId) -> Result<Option<DataFile>, EcpdsError> {
        self.inner.get_data_file(id).await
    }

    async fn insert_data_file(&self, data_file: &DataFile) -> Result<DataFileId, EcpdsError> {
        self.inner.insert_data_file(data_file).await
    }

    async fn remove_data_file(&self, id: DataFileId) -> Result<bool, EcpdsError> {
        let result = self.inner.remove_data_file(id).await;
        self.clear();
        result
    }

    async fn get_data_transfer(&self, id: TransferId) -> Result<Option<DataTransfer>, EcpdsError> {
        if let Some(hit) = self.transfer.get(id) {
            return Ok(Some(hit));
        }
        let generation = self.transfer.begin();
        let transfer = self.inner.get_data_transfer(id).await?;
        if let Some(transfer) = &transfer {
            self.transfer.complete(generation, transfer);
        }
        Ok(transfer)
    }

    async fn insert_data_transfer(&self, transfer: &DataTransfer) -> Result<TransferId, EcpdsError> {
        let id = self.inner.insert_data_transfer(transfer).await?;
        self.invalidate_destination(&transfer.destination);
        Ok(id)
    }

    async fn update_data_transfer(&self, transfer: &DataTransfer) -> Result<(), EcpdsError> {
        let result = self.inner.update_data_transfer(transfer).await;
        self.invalidate_transfer(transfer);
        result
    }

    async fn remove_data_transfer(&self, id: TransferId) -> Result<bool, EcpdsError> {
        let result = self.inner.remove_data_transfer(id).await;
        self.clear();
        result
    }

    async fn list_destination_transfers(
        &self,
        destination: &str,
    ) -> Result<Vec<DataTransfer>, EcpdsError> {
        self.inner.list_destination_transfers(destination).await
    }

    async fn list_data_file_transfers(
        &self,
        data_file_id: DataFileId,
    ) -> Result<Vec<DataTransfer>, EcpdsError> {
        self.inner.list_data_file_transfers(data_file_id).await
    }

    async fn insert_transfer_history(&self, history: &TransferHistory) -> Result<(), EcpdsError> {
        self.inner.insert_transfer_history(history).await
    }

    async fn list_transfer_history(
        &self,
        transfer_id: TransferId,
    ) -> Result<Vec<TransferHistory>, EcpdsError> {
        self.inner.list_transfer_history(transfer_id).await
    }
}
