// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistent store for deterministic testing.
//!
//! `MemoryStore` implements `PersistentStore` over plain maps. It counts the
//! reads it serves so cache tests can tell hits from misses, and it can be
//! switched to an unavailable mode where every call fails with `Transient`.
//! [`MemoryStore::pause_after`] parks the next `get_host` or
//! `get_data_transfer` call after its read, so tests can force a write in
//! between a read and whatever the caller does with it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{RwLock, oneshot};

use ecpds_core::traits::adapter::PluginAdapter;
use ecpds_core::traits::store::PersistentStore;
use ecpds_core::types::{
    AdapterType, Association, Country, DataFile, DataFileId, DataTransfer, Destination,
    HealthStatus, Host, TransferHistory, TransferId, TransferServer,
};
use ecpds_core::EcpdsError;

#[derive(Default)]
struct Tables {
    destinations: BTreeMap<String, Destination>,
    hosts: BTreeMap<String, Host>,
    associations: Vec<Association>,
    servers: BTreeMap<String, TransferServer>,
    countries: BTreeMap<String, Country>,
    data_files: BTreeMap<i64, DataFile>,
    transfers: BTreeMap<i64, DataTransfer>,
    history: Vec<TransferHistory>,
    aliases: BTreeMap<String, Vec<String>>,
    users: BTreeMap<String, Vec<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
    next_data_file: i64,
    next_transfer: i64,
}

/// Store side of an armed pause.
struct Armed {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Test side of an armed pause, returned by [`MemoryStore::pause_after`].
pub struct Pause {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl Pause {
    /// Wait until a caller is parked after its read.
    pub async fn reached(&mut self) {
        let _ = (&mut self.reached).await;
    }

    /// Let the parked caller return its (now stale) read.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// A `PersistentStore` held entirely in memory.
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
    pauses: Mutex<HashMap<&'static str, Armed>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                next_data_file: 1,
                next_transfer: 1,
                ..Tables::default()
            })),
            reads: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            pauses: Mutex::new(HashMap::new()),
        }
    }

    /// Park the next call of `operation` (`"get_host"` or
    /// `"get_data_transfer"`) after it has read, until the pause is released.
    pub fn pause_after(&self, operation: &'static str) -> Pause {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.insert(
                operation,
                Armed {
                    reached: reached_tx,
                    release: release_rx,
                },
            );
        }
        Pause {
            reached: reached_rx,
            release: release_tx,
        }
    }

    async fn checkpoint(&self, operation: &'static str) {
        let armed = self
            .pauses
            .lock()
            .ok()
            .and_then(|mut pauses| pauses.remove(operation));
        if let Some(armed) = armed {
            let _ = armed.reached.send(());
            let _ = armed.release.await;
        }
    }

    /// Number of read calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a transient error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn add_alias(&self, destination: &str, alias: &str) {
        self.tables
            .write()
            .await
            .aliases
            .entry(destination.to_string())
            .or_default()
            .push(alias.to_string());
    }

    pub async fn add_destination_user(&self, destination: &str, user: &str) {
        self.tables
            .write()
            .await
            .users
            .entry(destination.to_string())
            .or_default()
            .push(user.to_string());
    }

    pub async fn grant_incoming(&self, destination: &str, user: &str) {
        self.tables
            .write()
            .await
            .incoming
            .entry(destination.to_string())
            .or_default()
            .insert(user.to_string());
    }

    pub async fn incoming_permissions(&self, destination: &str) -> usize {
        self.tables
            .read()
            .await
            .incoming
            .get(destination)
            .map_or(0, BTreeSet::len)
    }

    /// Every transfer, including deleted ones.
    pub async fn all_transfers(&self) -> Vec<DataTransfer> {
        self.tables.read().await.transfers.values().cloned().collect()
    }

    /// Write a destination without going through any cache.
    pub async fn put_destination(&self, destination: Destination) {
        self.tables
            .write()
            .await
            .destinations
            .insert(destination.name.clone(), destination);
    }

    /// Write a transfer without going through any cache.
    pub async fn put_transfer(&self, transfer: DataTransfer) {
        self.tables
            .write()
            .await
            .transfers
            .insert(transfer.id.0, transfer);
    }

    fn guard(&self) -> Result<(), EcpdsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(EcpdsError::transient("memory store unavailable"))
        } else {
            Ok(())
        }
    }

    fn read_guard(&self) -> Result<(), EcpdsError> {
        self.guard()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, EcpdsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("unavailable".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), EcpdsError> {
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get_destination(&self, name: &str) -> Result<Option<Destination>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.destinations.get(name).cloned())
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.destinations.values().cloned().collect())
    }

    async fn insert_destination(&self, destination: &Destination) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        if tables.destinations.contains_key(&destination.name) {
            return Err(EcpdsError::AlreadyExists(format!(
                "destination {}",
                destination.name
            )));
        }
        tables
            .destinations
            .insert(destination.name.clone(), destination.clone());
        Ok(())
    }

    async fn update_destination(&self, destination: &Destination) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        match tables.destinations.get_mut(&destination.name) {
            Some(slot) => {
                *slot = destination.clone();
                Ok(())
            }
            None => Err(EcpdsError::NotFound(format!(
                "destination {}",
                destination.name
            ))),
        }
    }

    async fn remove_destination(&self, name: &str) -> Result<bool, EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        if tables.destinations.remove(name).is_none() {
            return Ok(false);
        }
        tables.transfers.retain(|_, t| t.destination != name);
        tables.associations.retain(|a| a.destination != name);
        tables.aliases.remove(name);
        tables.users.remove(name);
        tables.incoming.remove(name);
        Ok(true)
    }

    async fn list_aliases(&self, destination: &str) -> Result<Vec<String>, EcpdsError> {
        self.read_guard()?;
        Ok(self
            .tables
            .read()
            .await
            .aliases
            .get(destination)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_destination_users(&self, destination: &str) -> Result<Vec<String>, EcpdsError> {
        self.read_guard()?;
        Ok(self
            .tables
            .read()
            .await
            .users
            .get(destination)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_incoming_permissions(&self, destination: &str) -> Result<usize, EcpdsError> {
        self.guard()?;
        Ok(self
            .tables
            .write()
            .await
            .incoming
            .remove(destination)
            .map_or(0, |set| set.len()))
    }

    async fn get_host(&self, name: &str) -> Result<Option<Host>, EcpdsError> {
        self.read_guard()?;
        let host = self.tables.read().await.hosts.get(name).cloned();
        self.checkpoint("get_host").await;
        Ok(host)
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.hosts.values().cloned().collect())
    }

    async fn insert_host(&self, host: &Host) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        if tables.hosts.contains_key(&host.name) {
            return Err(EcpdsError::AlreadyExists(format!("host {}", host.name)));
        }
        tables.hosts.insert(host.name.clone(), host.clone());
        Ok(())
    }

    async fn update_host(&self, host: &Host) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        match tables.hosts.get_mut(&host.name) {
            Some(slot) => {
                *slot = host.clone();
                Ok(())
            }
            None => Err(EcpdsError::NotFound(format!("host {}", host.name))),
        }
    }

    async fn remove_host(&self, name: &str) -> Result<bool, EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        let removed = tables.hosts.remove(name).is_some();
        tables.associations.retain(|a| a.host != name);
        Ok(removed)
    }

    async fn insert_association(&self, association: &Association) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        if tables
            .associations
            .iter()
            .any(|a| a.destination == association.destination && a.host == association.host)
        {
            return Err(EcpdsError::AlreadyExists(format!(
                "association {}/{}",
                association.destination, association.host
            )));
        }
        tables.associations.push(association.clone());
        Ok(())
    }

    async fn remove_association(&self, destination: &str, host: &str) -> Result<bool, EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        let before = tables.associations.len();
        tables
            .associations
            .retain(|a| !(a.destination == destination && a.host == host));
        Ok(tables.associations.len() != before)
    }

    async fn list_associations(&self, destination: &str) -> Result<Vec<Association>, EcpdsError> {
        self.read_guard()?;
        let mut associations: Vec<Association> = self
            .tables
            .read()
            .await
            .associations
            .iter()
            .filter(|a| a.destination == destination)
            .cloned()
            .collect();
        associations.sort_by_key(|a| a.priority);
        Ok(associations)
    }

    async fn list_host_destinations(&self, host: &str) -> Result<Vec<String>, EcpdsError> {
        self.read_guard()?;
        Ok(self
            .tables
            .read()
            .await
            .associations
            .iter()
            .filter(|a| a.host == host)
            .map(|a| a.destination.clone())
            .collect())
    }

    async fn get_transfer_server(&self, name: &str) -> Result<Option<TransferServer>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.servers.get(name).cloned())
    }

    async fn list_transfer_servers(&self) -> Result<Vec<TransferServer>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.servers.values().cloned().collect())
    }

    async fn insert_transfer_server(&self, server: &TransferServer) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        if tables.servers.contains_key(&server.name) {
            return Err(EcpdsError::AlreadyExists(format!(
                "transfer server {}",
                server.name
            )));
        }
        tables.servers.insert(server.name.clone(), server.clone());
        Ok(())
    }

    async fn list_countries(&self) -> Result<Vec<Country>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.countries.values().cloned().collect())
    }

    async fn insert_country(&self, country: &Country) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        if tables.countries.contains_key(&country.iso) {
            return Err(EcpdsError::AlreadyExists(format!("country {}", country.iso)));
        }
        tables.countries.insert(country.iso.clone(), country.clone());
        Ok(())
    }

    async fn get_data_file(&self, id: DataFileId) -> Result<Option<DataFile>, EcpdsError> {
        self.read_guard()?;
        Ok(self.tables.read().await.data_files.get(&id.0).cloned())
    }

    async fn insert_data_file(&self, data_file: &DataFile) -> Result<DataFileId, EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        let id = DataFileId(tables.next_data_file);
        tables.next_data_file += 1;
        let mut stored = data_file.clone();
        stored.id = id;
        tables.data_files.insert(id.0, stored);
        Ok(id)
    }

    async fn remove_data_file(&self, id: DataFileId) -> Result<bool, EcpdsError> {
        self.guard()?;
        Ok(self.tables.write().await.data_files.remove(&id.0).is_some())
    }

    async fn get_data_transfer(&self, id: TransferId) -> Result<Option<DataTransfer>, EcpdsError> {
        self.read_guard()?;
        let transfer = self.tables.read().await.transfers.get(&id.0).cloned();
        self.checkpoint("get_data_transfer").await;
        Ok(transfer)
    }

    async fn insert_data_transfer(&self, transfer: &DataTransfer) -> Result<TransferId, EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        let id = TransferId(tables.next_transfer);
        tables.next_transfer += 1;
        let mut stored = transfer.clone();
        stored.id = id;
        tables.transfers.insert(id.0, stored);
        Ok(id)
    }

    async fn update_data_transfer(&self, transfer: &DataTransfer) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut tables = self.tables.write().await;
        match tables.transfers.get_mut(&transfer.id.0) {
            Some(slot) => {
                *slot = transfer.clone();
                Ok(())
            }
            None => Err(EcpdsError::NotFound(format!("transfer {}", transfer.id))),
        }
    }

    async fn remove_data_transfer(&self, id: TransferId) -> Result<bool, EcpdsError> {
        self.guard()?;
        Ok(self.tables.write().await.transfers.remove(&id.0).is_some())
    }

    async fn list_destination_transfers(
        &self,
        destination: &str,
    ) -> Result<Vec<DataTransfer>, EcpdsError> {
        self.read_guard()?;
        Ok(self
            .tables
            .read()
            .await
            .transfers
            .values()
            .filter(|t| t.destination == destination && !t.deleted)
            .cloned()
            .collect())
    }

    async fn list_data_file_transfers(
        &self,
        data_file_id: DataFileId,
    ) -> Result<Vec<DataTransfer>, EcpdsError> {
        self.read_guard()?;
        Ok(self
            .tables
            .read()
            .await
            .transfers
            .values()
            .filter(|t| t.data_file_id == data_file_id && !t.deleted)
            .cloned()
            .collect())
    }

    async fn insert_transfer_history(&self, history: &TransferHistory) -> Result<(), EcpdsError> {
        self.guard()?;
        self.tables.write().await.history.push(history.clone());
        Ok(())
    }

    async fn list_transfer_history(
        &self,
        transfer_id: TransferId,
    ) -> Result<Vec<TransferHistory>, EcpdsError> {
        self.read_guard()?;
        Ok(self
            .tables
            .read()
            .await
            .history
            .iter()
            .filter(|h| h.transfer_id == transfer_id)
            .cloned()
            .collect())
    }
}
