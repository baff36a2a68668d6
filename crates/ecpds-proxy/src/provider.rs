// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-facing file operations over logical paths.
//!
//! Metadata is answered from the cache layer. Byte movement is never done
//! here: `get_input` and `get_output` register a ticket and return the
//! [`ProxySocket`] the client uses to reach whoever serves the bytes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use ecpds_cache::{CachedStore, DestinationSnapshot};
use ecpds_config::EcpdsConfig;
use ecpds_core::types::{
    DataFileId, Direction, FileListElement, Host, Principal, TransferHistory, TransferServer,
};
use ecpds_core::{Authorizer, EcpdsError, MoverAdapter, MoverRequest, PersistentStore};
use ecpds_master::{ManagementService, PostCommit};
use ecpds_ticket::{Completion, ProxySocket, TicketDescriptor, TicketRepository, TicketTarget};

use crate::attachments::{AttachmentStore, Scope};
use crate::data::{self, DataDomain, DataEntry};
use crate::domain::{DirectorySupport, Domain, LogicalPath};
use crate::resolve::{AttachmentTarget, MoverTarget, Node, Resolver};

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub attachments_dir: PathBuf,
    /// Where clients reach bytes served by the master itself.
    pub public_address: String,
    pub public_port: u16,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self::from(&EcpdsConfig::default())
    }
}

impl From<&EcpdsConfig> for ProxySettings {
    fn from(config: &EcpdsConfig) -> Self {
        Self {
            attachments_dir: PathBuf::from(&config.proxy.attachments_dir),
            public_address: config.proxy.public_address.clone(),
            public_port: config.proxy.public_port,
        }
    }
}

fn not_plain(path: &LogicalPath) -> EcpdsError {
    EcpdsError::PermissionDenied(format!("{path}: not a plain file"))
}

fn scope_name(scope: &Scope) -> String {
    match scope {
        Scope::Destination(name) => name.clone(),
        Scope::Type(label) => format!("types/{label}"),
    }
}

fn throughput(destination: &Option<Arc<DestinationSnapshot>>) -> Option<u64> {
    destination
        .as_ref()
        .and_then(|d| d.destination.max_bytes_per_sec)
}

/// Where the bytes of a new ticket come from or go to.
struct MoverLeg {
    server: TransferServer,
    host: Option<Host>,
    data_file: Option<DataFileId>,
}

pub struct ProxyProvider {
    store: Arc<CachedStore>,
    tickets: Arc<TicketRepository>,
    master: Arc<ManagementService>,
    mover: Arc<dyn MoverAdapter>,
    resolver: Resolver,
    attachments: AttachmentStore,
    settings: ProxySettings,
}

impl ProxyProvider {
    pub fn new(
        tickets: Arc<TicketRepository>,
        master: Arc<ManagementService>,
        mover: Arc<dyn MoverAdapter>,
        authorizer: Arc<dyn Authorizer>,
        settings: ProxySettings,
    ) -> Self {
        let store = Arc::clone(master.store());
        Self {
            resolver: Resolver::new(Arc::clone(&store), authorizer),
            attachments: AttachmentStore::new(settings.attachments_dir.clone()),
            store,
            tickets,
            master,
            mover,
            settings,
        }
    }

    pub fn tickets(&self) -> &Arc<TicketRepository> {
        &self.tickets
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    fn data(&self) -> DataDomain<'_> {
        DataDomain {
            store: &self.store,
            attachments: &self.attachments,
        }
    }

    async fn resolve(
        &self,
        principal: &Principal,
        path: &str,
    ) -> Result<(LogicalPath, Node), EcpdsError> {
        let logical = LogicalPath::parse(path)?;
        let node = self.resolver.resolve(principal, &logical).await?;
        Ok((logical, node))
    }

    fn traced<T>(
        operation: &'static str,
        path: &str,
        started: Instant,
        result: Result<T, EcpdsError>,
    ) -> Result<T, EcpdsError> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(operation, path, elapsed_ms, "call finished"),
            Err(e) => debug!(operation, path, elapsed_ms, error = %e, "call failed"),
        }
        result
    }

    /// Register a ticket and have the mover prepare for it.
    ///
    /// The ticket is withdrawn again if the mover cannot be prepared.
    async fn via_mover(
        &self,
        descriptor: TicketDescriptor,
        leg: MoverLeg,
        domain: Domain,
    ) -> Result<ProxySocket, EcpdsError> {
        let ticket = self.tickets.add(descriptor);
        let request = MoverRequest {
            ticket: ticket.id,
            direction: ticket.direction,
            host: leg.host,
            path: ticket.target.path().to_string(),
            data_file: leg.data_file,
            offset: ticket.offset,
            length: ticket.length,
            umask: ticket.umask,
        };
        match self.mover.prepare(&leg.server, request).await {
            Ok(endpoint) => Ok(ProxySocket::via_mover(ticket.id, endpoint).in_domain(domain.to_string())),
            Err(e) => {
                self.tickets.remove(ticket.id);
                Err(e)
            }
        }
    }

    fn direct(&self, descriptor: TicketDescriptor, domain: Domain) -> ProxySocket {
        let ticket = self.tickets.add(descriptor);
        ProxySocket::direct(
            ticket.id,
            self.settings.public_address.clone(),
            self.settings.public_port,
        )
        .in_domain(domain.to_string())
    }

    async fn active_server(&self, name: &str) -> Result<TransferServer, EcpdsError> {
        self.store
            .get_transfer_server(name)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| EcpdsError::transient(format!("transfer server {name} not available")))
    }

    /// Mover receiving uploads for a destination: one serving its hosts, else any.
    async fn upload_server(&self, snapshot: &DestinationSnapshot) -> Result<TransferServer, EcpdsError> {
        let servers: Vec<TransferServer> = self
            .store
            .list_transfer_servers()
            .await?
            .into_iter()
            .filter(|s| s.active)
            .collect();
        let preferred = servers.iter().find(|s| {
            snapshot
                .hosts
                .iter()
                .any(|h| h.active && h.transfer_group == s.transfer_group)
        });
        preferred
            .or_else(|| servers.first())
            .cloned()
            .ok_or_else(|| EcpdsError::transient("no active transfer server"))
    }

    /// Open `path` for reading from `offset`, optionally for `length` bytes.
    #[instrument(skip(self))]
    pub async fn get_input(
        &self,
        principal: &Principal,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<ProxySocket, EcpdsError> {
        let started = Instant::now();
        let result = self.get_input_inner(principal, path, offset, length).await;
        Self::traced("get_input", path, started, result)
    }

    async fn get_input_inner(
        &self,
        principal: &Principal,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<ProxySocket, EcpdsError> {
        let logical = LogicalPath::parse(path)?;
        if length.is_some() && !logical.domain.capabilities().range_reads {
            return Err(EcpdsError::RangeNotSupported(format!(
                "{logical}: partial reads not supported"
            )));
        }
        let node = self.resolver.resolve(principal, &logical).await?;
        let with_length = |descriptor: TicketDescriptor| match length {
            Some(length) => descriptor.with_length(length),
            None => descriptor,
        };

        match node {
            Node::Directory(_) => Err(not_plain(&logical)),
            Node::Mover(MoverTarget {
                destination,
                server,
                host,
                path,
            }) => {
                if path.is_empty() {
                    return Err(not_plain(&logical));
                }
                self.mover.size(&server, &host, &path).await?;
                let limit = throughput(&destination);
                let descriptor = with_length(TicketDescriptor::read(
                    TicketTarget::Mover {
                        server: server.name.clone(),
                        host: host.name.clone(),
                        path,
                    },
                    offset,
                ));
                let leg = MoverLeg {
                    server,
                    host: Some(host),
                    data_file: None,
                };
                Ok(self
                    .via_mover(descriptor, leg, logical.domain)
                    .await?
                    .with_max_bytes_per_sec(limit))
            }
            Node::Attachment(AttachmentTarget {
                scope, segments, ..
            }) => {
                if self.attachments.stat(&scope, &segments).await?.is_dir {
                    return Err(not_plain(&logical));
                }
                let descriptor = TicketDescriptor::read(
                    TicketTarget::Attachment {
                        scope: scope_name(&scope),
                        path: segments.join("/"),
                    },
                    offset,
                );
                Ok(self.direct(descriptor, logical.domain))
            }
            Node::Data(target) => {
                let DataEntry::File {
                    transfer,
                    data_file,
                } = self.data().entry(&target.destination, &target.segments).await?
                else {
                    return Err(not_plain(&logical));
                };
                let mover = data_file.mover.clone().ok_or_else(|| {
                    EcpdsError::transient(format!("data file {} not held by any mover", data_file.id))
                })?;
                let server = self.active_server(&mover).await?;
                let limit = target.destination.destination.max_bytes_per_sec;
                let descriptor = TicketDescriptor::read(
                    TicketTarget::DataFile {
                        destination: transfer.destination.clone(),
                        path: transfer.target.clone(),
                        transfer: transfer.id,
                        data_file: data_file.id,
                    },
                    offset,
                );
                let leg = MoverLeg {
                    server,
                    host: None,
                    data_file: Some(data_file.id),
                };
                Ok(self
                    .via_mover(descriptor, leg, logical.domain)
                    .await?
                    .with_max_bytes_per_sec(limit))
            }
        }
    }

    /// Open `path` for writing at `offset`, creating it with `umask` if needed.
    #[instrument(skip(self))]
    pub async fn get_output(
        &self,
        principal: &Principal,
        path: &str,
        offset: u64,
        umask: Option<u32>,
    ) -> Result<ProxySocket, EcpdsError> {
        let started = Instant::now();
        let result = self.get_output_inner(principal, path, offset, umask).await;
        Self::traced("get_output", path, started, result)
    }

    async fn get_output_inner(
        &self,
        principal: &Principal,
        path: &str,
        offset: u64,
        umask: Option<u32>,
    ) -> Result<ProxySocket, EcpdsError> {
        let (logical, node) = self.resolve(principal, path).await?;
        if !logical.domain.capabilities().creation {
            return Err(EcpdsError::PermissionDenied(format!(
                "{logical}: read-only domain"
            )));
        }
        let with_umask = |descriptor: TicketDescriptor| match umask {
            Some(umask) => descriptor.with_umask(umask),
            None => descriptor,
        };

        match node {
            Node::Directory(_) => Err(not_plain(&logical)),
            Node::Mover(MoverTarget {
                destination,
                server,
                host,
                path,
            }) => {
                if path.is_empty() {
                    return Err(not_plain(&logical));
                }
                let limit = throughput(&destination);
                let descriptor = with_umask(TicketDescriptor::write(
                    TicketTarget::Mover {
                        server: server.name.clone(),
                        host: host.name.clone(),
                        path,
                    },
                    offset,
                ));
                let leg = MoverLeg {
                    server,
                    host: Some(host),
                    data_file: None,
                };
                Ok(self
                    .via_mover(descriptor, leg, logical.domain)
                    .await?
                    .with_max_bytes_per_sec(limit))
            }
            Node::Attachment(AttachmentTarget {
                scope, segments, ..
            }) => {
                if segments.is_empty() {
                    return Err(not_plain(&logical));
                }
                self.attachments.prepare_write(&scope, &segments).await?;
                let descriptor = with_umask(TicketDescriptor::write(
                    TicketTarget::Attachment {
                        scope: scope_name(&scope),
                        path: segments.join("/"),
                    },
                    offset,
                ));
                Ok(self.direct(descriptor, logical.domain))
            }
            Node::Data(target) => {
                if offset != 0 {
                    return Err(EcpdsError::RangeNotSupported(format!(
                        "{logical}: uploads start at offset 0"
                    )));
                }
                let name = data::upload_target(&target.destination, &target.segments, Utc::now())?;
                let server = self.upload_server(&target.destination).await?;
                let descriptor = with_umask(TicketDescriptor::write(
                    TicketTarget::Upload {
                        destination: target.destination.destination.name.clone(),
                        path: name,
                    },
                    0,
                ));
                let leg = MoverLeg {
                    server,
                    host: None,
                    data_file: None,
                };
                self.via_mover(descriptor, leg, logical.domain).await
            }
        }
    }

    /// Wait for the I/O behind `proxy` and reconcile its effects.
    #[instrument(skip(self, proxy), fields(ticket = %proxy.ticket))]
    pub async fn check(
        &self,
        principal: &Principal,
        proxy: &ProxySocket,
        timeout: Option<Duration>,
    ) -> Result<Completion, EcpdsError> {
        let started = Instant::now();
        let checked = self.tickets.check(proxy.ticket, timeout).await;
        let checked = Self::traced("check", &proxy.domain, started, checked)?;

        let now = Utc::now();
        let mut hooks = Vec::new();
        match (&checked.ticket.target, &checked.completion) {
            (
                TicketTarget::Upload { destination, path },
                Completion::Succeeded {
                    data_file: Some(data_file),
                    ..
                },
            ) => {
                match self.store.list_data_file_transfers(*data_file).await {
                    Ok(transfers) => {
                        for transfer in transfers {
                            hooks.push(PostCommit::History(TransferHistory {
                                transfer_id: transfer.id,
                                destination: transfer.destination,
                                status: transfer.status,
                                comment: format!("Uploaded as {path}"),
                                actor: principal.to_string(),
                                time: now,
                            }));
                        }
                    }
                    Err(e) => warn!(data_file = %data_file, error = %e, "could not list uploaded transfers"),
                }
                self.store.invalidate_destination(destination);
            }
            (
                TicketTarget::DataFile {
                    destination,
                    transfer,
                    ..
                },
                Completion::Succeeded { bytes, .. },
            ) if checked.ticket.direction == Direction::Read => {
                match self.store.get_data_transfer(*transfer).await {
                    Ok(Some(current)) => hooks.push(PostCommit::History(TransferHistory {
                        transfer_id: *transfer,
                        destination: destination.clone(),
                        status: current.status,
                        comment: format!("Retrieved {bytes} bytes"),
                        actor: principal.to_string(),
                        time: now,
                    })),
                    Ok(None) => debug!(transfer = %transfer, "transfer gone before history"),
                    Err(e) => warn!(transfer = %transfer, error = %e, "could not read transfer"),
                }
            }
            _ => {}
        }
        hooks.push(PostCommit::MonitoringWakeup);
        self.master.hooks().run(hooks).await;
        Ok(checked.completion)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, principal: &Principal, path: &str) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let (logical, node) = self.resolve(principal, path).await?;
            match node {
                Node::Directory(_) => Err(not_plain(&logical)),
                Node::Mover(target) => {
                    if target.path.is_empty() {
                        return Err(not_plain(&logical));
                    }
                    self.mover
                        .delete(&target.server, &target.host, &target.path)
                        .await
                }
                Node::Attachment(target) => {
                    self.attachments.delete(&target.scope, &target.segments).await
                }
                Node::Data(target) => {
                    match self.data().entry(&target.destination, &target.segments).await? {
                        DataEntry::File { transfer, .. } => {
                            self.master.clean_data_transfer(principal, transfer.id).await
                        }
                        DataEntry::Directory(_) => Err(not_plain(&logical)),
                    }
                }
            }
        }
        .await;
        Self::traced("delete", path, started, result)
    }

    #[instrument(skip(self))]
    pub async fn mkdir(&self, principal: &Principal, path: &str) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result = self.directory_op(principal, path, true).await;
        Self::traced("mkdir", path, started, result)
    }

    #[instrument(skip(self))]
    pub async fn rmdir(&self, principal: &Principal, path: &str) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result = self.directory_op(principal, path, false).await;
        Self::traced("rmdir", path, started, result)
    }

    async fn directory_op(
        &self,
        principal: &Principal,
        path: &str,
        create: bool,
    ) -> Result<(), EcpdsError> {
        let (logical, node) = self.resolve(principal, path).await?;
        let unsupported = || {
            EcpdsError::PermissionDenied(format!("{logical}: directories not supported here"))
        };
        match (logical.domain.capabilities().directories, node) {
            (DirectorySupport::Mover, Node::Mover(target)) => {
                if target.path.is_empty() || !self.mover.supports_directories(&target.host) {
                    return Err(unsupported());
                }
                if create {
                    self.mover
                        .mkdir(&target.server, &target.host, &target.path)
                        .await
                } else {
                    self.mover
                        .rmdir(&target.server, &target.host, &target.path)
                        .await
                }
            }
            (DirectorySupport::Markers, Node::Data(target)) => {
                if target.destination.destination.group_by_date || target.segments.is_empty() {
                    return Err(unsupported());
                }
                let scope = Scope::Destination(target.destination.destination.name.clone());
                if create {
                    self.attachments.write_marker(&scope, &target.segments).await
                } else {
                    self.attachments.remove_marker(&scope, &target.segments).await
                }
            }
            _ => Err(unsupported()),
        }
    }

    /// Rename within one domain scope.
    #[instrument(skip(self))]
    pub async fn rename(
        &self,
        principal: &Principal,
        source: &str,
        target: &str,
    ) -> Result<(), EcpdsError> {
        let started = Instant::now();
        let result: Result<(), EcpdsError> = async {
            let across = || EcpdsError::PermissionDenied("move across domains not supported".to_string());
            let (from_path, from) = self.resolve(principal, source).await?;
            let (to_path, to) = self.resolve(principal, target).await?;
            if from_path.domain != to_path.domain {
                return Err(across());
            }
            match (from, to) {
                (Node::Mover(a), Node::Mover(b)) => {
                    let same_scope = a.server.name == b.server.name
                        && a.host.name == b.host.name
                        && a.destination.as_ref().map(|d| &d.destination.name)
                            == b.destination.as_ref().map(|d| &d.destination.name);
                    if !same_scope {
                        return Err(across());
                    }
                    if a.path.is_empty() || b.path.is_empty() {
                        return Err(not_plain(&from_path));
                    }
                    self.mover.rename(&a.server, &a.host, &a.path, &b.path).await
                }
                (Node::Attachment(a), Node::Attachment(b)) => {
                    if a.scope != b.scope {
                        return Err(across());
                    }
                    self.attachments.rename(&a.scope, &a.segments, &b.segments).await
                }
                (Node::Data(_), Node::Data(_)) => Err(EcpdsError::PermissionDenied(format!(
                    "{from_path}: data files cannot be renamed"
                ))),
                _ => Err(across()),
            }
        }
        .await;
        Self::traced("move", source, started, result)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        principal: &Principal,
        path: &str,
    ) -> Result<Vec<FileListElement>, EcpdsError> {
        let started = Instant::now();
        let result: Result<Vec<FileListElement>, EcpdsError> = async {
            let (_, node) = self.resolve(principal, path).await?;
            match node {
                Node::Directory(level) => self.resolver.list_level(principal, &level).await,
                Node::Mover(target) => {
                    self.mover
                        .list(&target.server, &target.host, &target.path)
                        .await
                }
                Node::Attachment(target) => {
                    self.attachments
                        .list(&target.scope, &target.segments, &target.owner, &target.group)
                        .await
                }
                Node::Data(target) => {
                    let snapshot = &target.destination;
                    match self.data().entry(snapshot, &target.segments).await? {
                        DataEntry::Directory(dir) => self.data().list(snapshot, &dir).await,
                        DataEntry::File { transfer, .. } => {
                            let name = data::file_name(snapshot, &transfer);
                            Ok(vec![data::file_element(snapshot, &transfer, name)])
                        }
                    }
                }
            }
        }
        .await;
        Self::traced("list", path, started, result)
    }

    #[instrument(skip(self))]
    pub async fn size(&self, principal: &Principal, path: &str) -> Result<u64, EcpdsError> {
        let started = Instant::now();
        let result: Result<u64, EcpdsError> = async {
            let (logical, node) = self.resolve(principal, path).await?;
            match node {
                Node::Directory(_) => Err(not_plain(&logical)),
                Node::Mover(target) => {
                    if target.path.is_empty() {
                        return Err(not_plain(&logical));
                    }
                    self.mover
                        .size(&target.server, &target.host, &target.path)
                        .await
                }
                Node::Attachment(target) => {
                    let info = self.attachments.stat(&target.scope, &target.segments).await?;
                    if info.is_dir {
                        return Err(not_plain(&logical));
                    }
                    Ok(info.size)
                }
                Node::Data(target) => {
                    match self.data().entry(&target.destination, &target.segments).await? {
                        DataEntry::File { transfer, .. } => Ok(transfer.size),
                        DataEntry::Directory(_) => Err(not_plain(&logical)),
                    }
                }
            }
        }
        .await;
        Self::traced("size", path, started, result)
    }

    #[instrument(skip(self))]
    pub async fn modified(
        &self,
        principal: &Principal,
        path: &str,
    ) -> Result<DateTime<Utc>, EcpdsError> {
        let started = Instant::now();
        let result: Result<DateTime<Utc>, EcpdsError> = async {
            let (logical, node) = self.resolve(principal, path).await?;
            match node {
                Node::Directory(_) => Err(not_plain(&logical)),
                Node::Mover(target) => {
                    if target.path.is_empty() {
                        return Err(not_plain(&logical));
                    }
                    self.mover
                        .modified(&target.server, &target.host, &target.path)
                        .await
                }
                Node::Attachment(target) => {
                    let info = self.attachments.stat(&target.scope, &target.segments).await?;
                    if info.is_dir {
                        return Err(not_plain(&logical));
                    }
                    Ok(info.modified)
                }
                Node::Data(target) => {
                    match self.data().entry(&target.destination, &target.segments).await? {
                        DataEntry::File { transfer, .. } => Ok(transfer.queue_time),
                        DataEntry::Directory(_) => Err(not_plain(&logical)),
                    }
                }
            }
        }
        .await;
        Self::traced("modified", path, started, result)
    }
}
