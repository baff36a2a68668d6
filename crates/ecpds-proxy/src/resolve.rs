// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Level-by-level resolution of logical paths.
//!
//! Each domain has one resolver in [`RESOLVERS`]. A resolver consumes
//! segments left to right, validating existence, authorization and
//! activation at each step. Running out of segments yields the
//! [`Level`] whose listing is the next step down.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use ecpds_cache::{CachedStore, DestinationSnapshot};
use ecpds_core::types::{FileListElement, Host, Principal, Resource, TransferServer};
use ecpds_core::{Authorizer, EcpdsError, PersistentStore};

use crate::attachments::Scope;
use crate::domain::{Domain, LogicalPath};

/// Owner shown for virtual directories not owned by a destination.
pub const SYSTEM_OWNER: &str = "ecpds";

/// A virtual directory whose listing is the next resolution level.
#[derive(Debug, Clone)]
pub enum Level {
    Destinations { country: Option<String> },
    Countries,
    Types,
    /// Servers of the destination's transfer groups, or every server.
    Servers {
        destination: Option<Arc<DestinationSnapshot>>,
    },
    Hosts {
        destination: Option<Arc<DestinationSnapshot>>,
        server: TransferServer,
    },
}

/// A path on a remote host, reached through a mover.
#[derive(Debug, Clone)]
pub struct MoverTarget {
    pub destination: Option<Arc<DestinationSnapshot>>,
    pub server: TransferServer,
    pub host: Host,
    /// Relative to the host; empty for the host's own directory.
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentTarget {
    pub scope: Scope,
    pub segments: Vec<String>,
    pub owner: String,
    pub group: String,
}

/// Segments below a destination in the `data` domain.
#[derive(Debug, Clone)]
pub struct DataTarget {
    pub destination: Arc<DestinationSnapshot>,
    pub segments: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Directory(Level),
    Mover(MoverTarget),
    Attachment(AttachmentTarget),
    Data(DataTarget),
}

type ResolveFn = for<'a> fn(
    &'a Resolver,
    &'a Principal,
    &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>>;

/// One resolver per domain tag.
const RESOLVERS: [(Domain, ResolveFn); 6] = [
    (Domain::Destinations, resolve_destinations),
    (Domain::Countries, resolve_countries),
    (Domain::Hosts, resolve_hosts),
    (Domain::Attachments, resolve_attachments),
    (Domain::Types, resolve_types),
    (Domain::Data, resolve_data),
];

pub struct Resolver {
    store: Arc<CachedStore>,
    authorizer: Arc<dyn Authorizer>,
}

impl Resolver {
    pub fn new(store: Arc<CachedStore>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { store, authorizer }
    }

    pub async fn resolve(
        &self,
        principal: &Principal,
        path: &LogicalPath,
    ) -> Result<Node, EcpdsError> {
        let resolve = RESOLVERS
            .iter()
            .find(|(domain, _)| *domain == path.domain)
            .map(|(_, resolve)| *resolve)
            .ok_or_else(|| EcpdsError::NotFound(format!("{}: not a registered domain", path.domain)))?;
        resolve(self, principal, &path.segments).await
    }

    async fn authorize(&self, principal: &Principal, resource: Resource) -> Result<(), EcpdsError> {
        if self.authorizer.is_authorized(principal, &resource).await? {
            Ok(())
        } else {
            Err(EcpdsError::PermissionDenied(resource.to_string()))
        }
    }

    /// Listing filter: authorization failures hide the entry.
    async fn allowed(&self, principal: &Principal, resource: Resource) -> bool {
        match self.authorizer.is_authorized(principal, &resource).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(%resource, error = %e, "authorization check failed");
                false
            }
        }
    }

    async fn destination(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<Arc<DestinationSnapshot>, EcpdsError> {
        let snapshot = self
            .store
            .destination_snapshot(name)
            .await?
            .ok_or_else(|| EcpdsError::NotFound(format!("destination {name}")))?;
        self.authorize(principal, Resource::Destination(name.to_string()))
            .await?;
        if !snapshot.destination.active {
            return Err(EcpdsError::PermissionDenied(format!(
                "destination {name} not active"
            )));
        }
        Ok(snapshot)
    }

    async fn server(&self, name: &str) -> Result<TransferServer, EcpdsError> {
        self.store
            .get_transfer_server(name)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| EcpdsError::NotFound(format!("transfer server {name}")))
    }

    /// Servers, then hosts, then the remaining path.
    async fn mover_chain(
        &self,
        principal: &Principal,
        destination: Option<Arc<DestinationSnapshot>>,
        segments: &[String],
    ) -> Result<Node, EcpdsError> {
        let Some(server_name) = segments.first() else {
            return Ok(Node::Directory(Level::Servers { destination }));
        };
        let server = self.server(server_name).await?;
        if let Some(snapshot) = &destination {
            let serves = snapshot
                .hosts
                .iter()
                .any(|h| h.active && h.transfer_group == server.transfer_group);
            if !serves {
                return Err(EcpdsError::NotFound(format!(
                    "transfer server {server_name} for destination {}",
                    snapshot.destination.name
                )));
            }
        }

        let Some(host_name) = segments.get(1) else {
            return Ok(Node::Directory(Level::Hosts {
                destination,
                server,
            }));
        };
        let host = match &destination {
            Some(snapshot) => snapshot
                .host(host_name)
                .filter(|h| h.active)
                .cloned()
                .ok_or_else(|| {
                    EcpdsError::NotFound(format!(
                        "host {host_name} for destination {}",
                        snapshot.destination.name
                    ))
                })?,
            None => {
                let host = self
                    .store
                    .get_host(host_name)
                    .await?
                    .filter(|h| h.active)
                    .ok_or_else(|| EcpdsError::NotFound(format!("host {host_name}")))?;
                self.authorize(principal, Resource::Host(host.name.clone()))
                    .await?;
                host
            }
        };
        if host.transfer_group != server.transfer_group {
            return Err(EcpdsError::NotFound(format!(
                "host {host_name} not served by {}",
                server.name
            )));
        }

        Ok(Node::Mover(MoverTarget {
            destination,
            server,
            host,
            path: segments[2..].join("/"),
        }))
    }

    /// Entries of a virtual directory.
    pub async fn list_level(
        &self,
        principal: &Principal,
        level: &Level,
    ) -> Result<Vec<FileListElement>, EcpdsError> {
        let mut listing = match level {
            Level::Destinations { country } => {
                let mut listing = Vec::new();
                for dest in self.store.list_destinations().await? {
                    if !dest.active {
                        continue;
                    }
                    if country.as_ref().is_some_and(|iso| *iso != dest.country_iso) {
                        continue;
                    }
                    if !self
                        .allowed(principal, Resource::Destination(dest.name.clone()))
                        .await
                    {
                        continue;
                    }
                    let comment = (!dest.comment.is_empty()).then(|| dest.comment.clone());
                    listing.push(FileListElement::directory(
                        dest.name,
                        dest.ecuser,
                        dest.country_iso,
                        comment,
                    ));
                }
                listing
            }
            Level::Countries => {
                let mut listing = Vec::new();
                for country in self.store.list_countries().await? {
                    if self
                        .allowed(principal, Resource::Country(country.iso.clone()))
                        .await
                    {
                        listing.push(FileListElement::directory(
                            country.iso.clone(),
                            SYSTEM_OWNER,
                            country.iso,
                            Some(country.name),
                        ));
                    }
                }
                listing
            }
            Level::Types => {
                let labels: BTreeSet<String> = self
                    .store
                    .list_destinations()
                    .await?
                    .into_iter()
                    .filter(|d| d.active)
                    .map(|d| d.type_label)
                    .collect();
                let mut listing = Vec::new();
                for label in labels {
                    if self.allowed(principal, Resource::Type(label.clone())).await {
                        listing.push(FileListElement::directory(
                            label,
                            SYSTEM_OWNER,
                            "types",
                            None,
                        ));
                    }
                }
                listing
            }
            Level::Servers { destination } => {
                let groups: Option<BTreeSet<&str>> = destination.as_ref().map(|snapshot| {
                    snapshot
                        .hosts
                        .iter()
                        .filter(|h| h.active)
                        .map(|h| h.transfer_group.as_str())
                        .collect()
                });
                self.store
                    .list_transfer_servers()
                    .await?
                    .into_iter()
                    .filter(|s| s.active)
                    .filter(|s| {
                        groups
                            .as_ref()
                            .is_none_or(|g| g.contains(s.transfer_group.as_str()))
                    })
                    .map(|s| FileListElement::directory(s.name, SYSTEM_OWNER, s.transfer_group, None))
                    .collect()
            }
            Level::Hosts {
                destination,
                server,
            } => {
                let candidates = match destination {
                    Some(snapshot) => snapshot.hosts.clone(),
                    None => self.store.list_hosts().await?,
                };
                let mut listing = Vec::new();
                for host in candidates {
                    if !host.active || host.transfer_group != server.transfer_group {
                        continue;
                    }
                    if destination.is_none()
                        && !self.allowed(principal, Resource::Host(host.name.clone())).await
                    {
                        continue;
                    }
                    listing.push(FileListElement::directory(
                        host.name,
                        host.login,
                        host.transfer_group,
                        None,
                    ));
                }
                listing
            }
        };
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }
}

fn resolve_destinations<'a>(
    resolver: &'a Resolver,
    principal: &'a Principal,
    segments: &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>> {
    Box::pin(async move {
        let Some(name) = segments.first() else {
            return Ok(Node::Directory(Level::Destinations { country: None }));
        };
        let snapshot = resolver.destination(principal, name).await?;
        resolver
            .mover_chain(principal, Some(snapshot), &segments[1..])
            .await
    })
}

fn resolve_countries<'a>(
    resolver: &'a Resolver,
    principal: &'a Principal,
    segments: &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>> {
    Box::pin(async move {
        let Some(iso) = segments.first() else {
            return Ok(Node::Directory(Level::Countries));
        };
        let known = resolver
            .store
            .list_countries()
            .await?
            .iter()
            .any(|c| c.iso == *iso);
        if !known {
            return Err(EcpdsError::NotFound(format!("country {iso}")));
        }
        resolver
            .authorize(principal, Resource::Country(iso.clone()))
            .await?;

        let Some(name) = segments.get(1) else {
            return Ok(Node::Directory(Level::Destinations {
                country: Some(iso.clone()),
            }));
        };
        let snapshot = resolver.destination(principal, name).await?;
        if snapshot.destination.country_iso != *iso {
            return Err(EcpdsError::NotFound(format!(
                "destination {name} in country {iso}"
            )));
        }
        resolver
            .mover_chain(principal, Some(snapshot), &segments[2..])
            .await
    })
}

fn resolve_hosts<'a>(
    resolver: &'a Resolver,
    principal: &'a Principal,
    segments: &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>> {
    Box::pin(async move { resolver.mover_chain(principal, None, segments).await })
}

fn resolve_attachments<'a>(
    resolver: &'a Resolver,
    principal: &'a Principal,
    segments: &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>> {
    Box::pin(async move {
        let Some(name) = segments.first() else {
            return Ok(Node::Directory(Level::Destinations { country: None }));
        };
        let snapshot = resolver.destination(principal, name).await?;
        Ok(Node::Attachment(AttachmentTarget {
            scope: Scope::Destination(name.clone()),
            segments: segments[1..].to_vec(),
            owner: snapshot.destination.ecuser.clone(),
            group: snapshot.destination.country_iso.clone(),
        }))
    })
}

fn resolve_types<'a>(
    resolver: &'a Resolver,
    principal: &'a Principal,
    segments: &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>> {
    Box::pin(async move {
        let Some(label) = segments.first() else {
            return Ok(Node::Directory(Level::Types));
        };
        let known = resolver
            .store
            .list_destinations()
            .await?
            .iter()
            .any(|d| d.active && d.type_label == *label);
        if !known {
            return Err(EcpdsError::NotFound(format!("type {label}")));
        }
        resolver
            .authorize(principal, Resource::Type(label.clone()))
            .await?;
        Ok(Node::Attachment(AttachmentTarget {
            scope: Scope::Type(label.clone()),
            segments: segments[1..].to_vec(),
            owner: SYSTEM_OWNER.to_string(),
            group: label.clone(),
        }))
    })
}

fn resolve_data<'a>(
    resolver: &'a Resolver,
    principal: &'a Principal,
    segments: &'a [String],
) -> BoxFuture<'a, Result<Node, EcpdsError>> {
    Box::pin(async move {
        let Some(name) = segments.first() else {
            return Ok(Node::Directory(Level::Destinations { country: None }));
        };
        let destination = resolver.destination(principal, name).await?;
        Ok(Node::Data(DataTarget {
            destination,
            segments: segments[1..].to_vec(),
        }))
    })
}
