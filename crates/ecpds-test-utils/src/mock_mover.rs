// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock mover for deterministic testing.
//!
//! `MockMover` keeps a flat map of remote files per host, records every
//! prepared request and can be told to expose directory operations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use ecpds_core::traits::mover::{MoverAdapter, MoverRequest};
use ecpds_core::types::{FILE_PERMISSION, FileListElement, Host, MoverEndpoint, TransferServer};
use ecpds_core::EcpdsError;

#[derive(Debug, Clone)]
struct RemoteFile {
    size: u64,
    modified: DateTime<Utc>,
}

/// A mover serving an in-memory file tree.
pub struct MockMover {
    files: Arc<Mutex<BTreeMap<(String, String), RemoteFile>>>,
    prepared: Arc<Mutex<Vec<MoverRequest>>>,
    directories: Arc<Mutex<Vec<(String, String)>>>,
    supports_directories: AtomicBool,
    failing: AtomicBool,
}

impl MockMover {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(BTreeMap::new())),
            prepared: Arc::new(Mutex::new(Vec::new())),
            directories: Arc::new(Mutex::new(Vec::new())),
            supports_directories: AtomicBool::new(false),
            failing: AtomicBool::new(false),
        }
    }

    /// Place a file on a remote host.
    pub async fn put_file(&self, host: &str, path: &str, size: u64) {
        self.files.lock().await.insert(
            (host.to_string(), path.to_string()),
            RemoteFile {
                size,
                modified: Utc::now(),
            },
        );
    }

    pub async fn has_file(&self, host: &str, path: &str) -> bool {
        self.files
            .lock()
            .await
            .contains_key(&(host.to_string(), path.to_string()))
    }

    /// Every request passed to `prepare()`.
    pub async fn prepared_requests(&self) -> Vec<MoverRequest> {
        self.prepared.lock().await.clone()
    }

    /// Directories created through `mkdir()`.
    pub async fn created_directories(&self) -> Vec<(String, String)> {
        self.directories.lock().await.clone()
    }

    pub fn set_supports_directories(&self, supported: bool) {
        self.supports_directories.store(supported, Ordering::SeqCst);
    }

    /// Make every call fail with a transient error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), EcpdsError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(EcpdsError::transient("mover unreachable"))
        } else {
            Ok(())
        }
    }

    async fn file(&self, host: &Host, path: &str) -> Result<RemoteFile, EcpdsError> {
        self.files
            .lock()
            .await
            .get(&(host.name.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| EcpdsError::NotFound(format!("{}:{path}", host.name)))
    }
}

impl Default for MockMover {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MoverAdapter for MockMover {
    async fn prepare(
        &self,
        server: &TransferServer,
        request: MoverRequest,
    ) -> Result<MoverEndpoint, EcpdsError> {
        self.guard()?;
        self.prepared.lock().await.push(request);
        Ok(MoverEndpoint {
            host: server.address.clone(),
            port: server.port,
            client_initiates: true,
        })
    }

    async fn list(
        &self,
        _server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<Vec<FileListElement>, EcpdsError> {
        self.guard()?;
        let prefix = path.trim_end_matches('/');
        Ok(self
            .files
            .lock()
            .await
            .iter()
            .filter(|((h, p), _)| h == &host.name && parent(p) == prefix)
            .map(|((_, p), file)| FileListElement {
                name: p.rsplit('/').next().unwrap_or(p.as_str()).to_string(),
                permission: FILE_PERMISSION.to_string(),
                owner: host.login.clone(),
                group: host.transfer_group.clone(),
                size: file.size,
                mtime: file.modified,
                comment: None,
            })
            .collect())
    }

    async fn size(
        &self,
        _server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<u64, EcpdsError> {
        self.guard()?;
        Ok(self.file(host, path).await?.size)
    }

    async fn modified(
        &self,
        _server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<DateTime<Utc>, EcpdsError> {
        self.guard()?;
        Ok(self.file(host, path).await?.modified)
    }

    async fn delete(
        &self,
        _server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<(), EcpdsError> {
        self.guard()?;
        self.files
            .lock()
            .await
            .remove(&(host.name.clone(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| EcpdsError::NotFound(format!("{}:{path}", host.name)))
    }

    async fn rename(
        &self,
        _server: &TransferServer,
        host: &Host,
        source: &str,
        target: &str,
    ) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut files = self.files.lock().await;
        let file = files
            .remove(&(host.name.clone(), source.to_string()))
            .ok_or_else(|| EcpdsError::NotFound(format!("{}:{source}", host.name)))?;
        files.insert((host.name.clone(), target.to_string()), file);
        Ok(())
    }

    fn supports_directories(&self, _host: &Host) -> bool {
        self.supports_directories.load(Ordering::SeqCst)
    }

    async fn mkdir(
        &self,
        _server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<(), EcpdsError> {
        self.guard()?;
        self.directories
            .lock()
            .await
            .push((host.name.clone(), path.to_string()));
        Ok(())
    }

    async fn rmdir(
        &self,
        _server: &TransferServer,
        host: &Host,
        path: &str,
    ) -> Result<(), EcpdsError> {
        self.guard()?;
        let mut directories = self.directories.lock().await;
        let before = directories.len();
        directories.retain(|(h, p)| !(h == &host.name && p == path));
        if directories.len() == before {
            return Err(EcpdsError::NotFound(format!("{}:{path}", host.name)));
        }
        Ok(())
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}
