// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the persistent store and audit sink.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use ecpds_config::model::StorageConfig;
use ecpds_core::types::{
    AdapterType, Association, AuditRecord, Country, DataFile, DataFileId, DataTransfer,
    Destination, HealthStatus, Host, TransferHistory, TransferId, TransferServer,
};
use ecpds_core::{AuditSink, EcpdsError, PersistentStore, PluginAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened lazily by [`SqliteStore::initialize`]; every other
/// call fails with a storage error until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// The connection is not opened until [`initialize`](Self::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already open database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open the configured database file and apply migrations.
    pub async fn initialize(&self) -> Result<(), EcpdsError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| EcpdsError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, EcpdsError> {
        self.db.get().ok_or_else(|| EcpdsError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    pub async fn add_alias(&self, destination: &str, alias: &str) -> Result<(), EcpdsError> {
        queries::destinations::add_alias(self.db()?, destination, alias).await
    }

    pub async fn add_destination_user(&self, destination: &str, user: &str) -> Result<(), EcpdsError> {
        queries::destinations::add_destination_user(self.db()?, destination, user).await
    }

    pub async fn grant_incoming(&self, destination: &str, user: &str) -> Result<(), EcpdsError> {
        queries::destinations::grant_incoming(self.db()?, destination, user).await
    }

    /// Latest audit records, newest first.
    pub async fn list_audit(
        &self,
        target: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, EcpdsError> {
        queries::audit::list_audit(self.db()?, target, limit).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, EcpdsError> {
        let db = match self.db() {
            Ok(db) => db,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), EcpdsError> {
        if let Some(db) = self.db.get() {
            if self.config.wal_mode {
                db.checkpoint().await?;
                debug!("shutdown: WAL checkpoint complete");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    // --- Destinations ---

    async fn get_destination(&self, name: &str) -> Result<Option<Destination>, EcpdsError> {
        queries::destinations::get_destination(self.db()?, name).await
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, EcpdsError> {
        queries::destinations::list_destinations(self.db()?).await
    }

    async fn insert_destination(&self, destination: &Destination) -> Result<(), EcpdsError> {
        queries::destinations::insert_destination(self.db()?, destination).await
    }

    async fn update_destination(&self, destination: &Destination) -> Result<(), EcpdsError> {
        queries::destinations::update_destination(self.db()?, destination).await
    }

    async fn remove_destination(&self, name: &str) -> Result<bool, EcpdsError> {
        queries::destinations::remove_destination(self.db()?, name).await
    }

    async fn list_aliases(&self, destination: &str) -> Result<Vec<String>, EcpdsError> {
        queries::destinations::list_aliases(self.db()?, destination).await
    }

    async fn list_destination_users(&self, destination: &str) -> Result<Vec<String>, EcpdsError> {
        queries::destinations::list_destination_users(self.db()?, destination).await
    }

    async fn remove_incoming_permissions(&self, destination: &str) -> Result<usize, EcpdsError> {
        queries::destinations::remove_incoming_permissions(self.db()?, destination).await
    }

    // --- Hosts and movers ---

    async fn get_host(&self, name: &str) -> Result<Option<Host>, EcpdsError> {
        queries::hosts::get_host(self.db()?, name).await
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, EcpdsError> {
        queries::hosts::list_hosts(self.db()?).await
    }

    async fn insert_host(&self, host: &Host) -> Result<(), EcpdsError> {
        queries::hosts::insert_host(self.db()?, host).await
    }

    async fn update_host(&self, host: &Host) -> Result<(), EcpdsError> {
        queries::hosts::update_host(self.db()?, host).await
    }

    async fn remove_host(&self, name: &str) -> Result<bool, EcpdsError> {
        queries::hosts::remove_host(self.db()?, name).await
    }

    async fn insert_association(&self, association: &Association) -> Result<(), EcpdsError> {
        queries::hosts::insert_association(self.db()?, association).await
    }

    async fn remove_association(&self, destination: &str, host: &str) -> Result<bool, EcpdsError> {
        queries::hosts::remove_association(self.db()?, destination, host).await
    }

    async fn list_associations(&self, destination: &str) -> Result<Vec<Association>, EcpdsError> {
        queries::hosts::list_associations(self.db()?, destination).await
    }

    async fn list_host_destinations(&self, host: &str) -> Result<Vec<String>, EcpdsError> {
        queries::hosts::list_host_destinations(self.db()?, host).await
    }

    async fn get_transfer_server(&self, name: &str) -> Result<Option<TransferServer>, EcpdsError> {
        queries::hosts::get_transfer_server(self.db()?, name).await
    }

    async fn list_transfer_servers(&self) -> Result<Vec<TransferServer>, EcpdsError> {
        queries::hosts::list_transfer_servers(self.db()?).await
    }

    async fn insert_transfer_server(&self, server: &TransferServer) -> Result<(), EcpdsError> {
        queries::hosts::insert_transfer_server(self.db()?, server).await
    }

    async fn list_countries(&self) -> Result<Vec<Country>, EcpdsError> {
        queries::hosts::list_countries(self.db()?).await
    }

    async fn insert_country(&self, country: &Country) -> Result<(), EcpdsError> {
        queries::hosts::insert_country(self.db()?, country).await
    }

    // --- Data files and transfers ---

    async fn get_data_file(&self, id: DataFileId) -> Result<Option<DataFile>, EcpdsError> {
        queries::transfers::get_data_file(self.db()?, id).await
    }

    async fn insert_data_file(&self, data_file: &DataFile) -> Result<DataFileId, EcpdsError> {
        queries::transfers::insert_data_file(self.db()?, data_file).await
    }

    async fn remove_data_file(&self, id: DataFileId) -> Result<bool, EcpdsError> {
        queries::transfers::remove_data_file(self.db()?, id).await
    }

    async fn get_data_transfer(&self, id: TransferId) -> Result<Option<DataTransfer>, EcpdsError> {
        queries::transfers::get_data_transfer(self.db()?, id).await
    }

    async fn insert_data_transfer(&self, transfer: &DataTransfer) -> Result<TransferId, EcpdsError> {
        queries::transfers::insert_data_transfer(self.db()?, transfer).await
    }

    async fn update_data_transfer(&self, transfer: &DataTransfer) -> Result<(), EcpdsError> {
        queries::transfers::update_data_transfer(self.db()?, transfer).await
    }

    async fn remove_data_transfer(&self, id: TransferId) -> Result<bool, EcpdsError> {
        queries::transfers::remove_data_transfer(self.db()?, id).await
    }

    async fn list_destination_transfers(
        &self,
        destination: &str,
    ) -> Result<Vec<DataTransfer>, EcpdsError> {
        queries::transfers::list_destination_transfers(self.db()?, destination).await
    }

    async fn list_data_file_transfers(
        &self,
        data_file_id: DataFileId,
    ) -> Result<Vec<DataTransfer>, EcpdsError> {
        queries::transfers::list_data_file_transfers(self.db()?, data_file_id).await
    }

    async fn insert_transfer_history(&self, history: &TransferHistory) -> Result<(), EcpdsError> {
        queries::transfers::insert_transfer_history(self.db()?, history).await
    }

    async fn list_transfer_history(
        &self,
        transfer_id: TransferId,
    ) -> Result<Vec<TransferHistory>, EcpdsError> {
        queries::transfers::list_transfer_history(self.db()?, transfer_id).await
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn record(&self, record: &AuditRecord) -> Result<(), EcpdsError> {
        queries::audit::insert_audit(self.db()?, record).await
    }
}
