// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the ticket broker, caches, state machine and proxy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a single scheduled DataTransfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(pub i64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a DataFile (the payload shared by many transfers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataFileId(pub i64);

impl fmt::Display for DataFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a ticket issued by the ticket repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The remote party on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Mover,
    Scheduler,
    Monitoring,
    Authorization,
    Audit,
}

/// Lifecycle status of a destination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum DestinationStatus {
    Init,
    Exec,
    Sche,
    Fail,
    Intr,
    Wait,
    Done,
    Retr,
    Rstr,
    Stop,
    Hold,
    Idle,
}

impl DestinationStatus {
    /// Name shown on dashboards and listings.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Init => "Initialized",
            Self::Exec => "Running",
            Self::Sche => "Waiting",
            Self::Fail => "NoHosts",
            Self::Intr => "Interrupted",
            Self::Wait => "Idle",
            Self::Done => "Resending",
            Self::Retr => "Retrying",
            Self::Rstr => "Restarting",
            Self::Stop => "Stopped",
            Self::Hold => "Failed",
            Self::Idle => "Sleeping",
        }
    }

    /// Administratively paused.
    pub fn is_held(self) -> bool {
        matches!(self, Self::Stop | Self::Hold)
    }
}

/// Status of a single data transfer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Init,
    Sche,
    Fetc,
    Hold,
    Wait,
    Exec,
    Done,
    Retr,
    Stop,
    Fail,
    Intr,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 11] = [
        Self::Init,
        Self::Sche,
        Self::Fetc,
        Self::Hold,
        Self::Wait,
        Self::Exec,
        Self::Done,
        Self::Retr,
        Self::Stop,
        Self::Fail,
        Self::Intr,
    ];

    /// Name shown on dashboards and listings.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Init => "Arriving",
            Self::Sche => "Preset",
            Self::Fetc => "Fetching",
            Self::Hold => "StandBy",
            Self::Wait => "Queued",
            Self::Exec => "Transferring",
            Self::Done => "Done",
            Self::Retr => "ReQueued",
            Self::Stop => "Stopped",
            Self::Fail => "Failed",
            Self::Intr => "Interrupted",
        }
    }

    /// Counted as a bad transfer by monitoring.
    pub fn is_bad(self) -> bool {
        matches!(self, Self::Fail | Self::Stop | Self::Intr)
    }

    /// Still waiting to be delivered.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Wait | Self::Retr | Self::Sche | Self::Init | Self::Fetc)
    }

    /// A retrieval or a dissemination may be running for this transfer.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Fetc | Self::Exec)
    }
}

/// Scheduler bookkeeping attached to every destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerValue {
    /// Requeue everything on the next start.
    pub requeue: bool,
    /// Number of times the destination was (re)started.
    pub start_count: u32,
}

/// A named delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub active: bool,
    pub status: DestinationStatus,
    /// Free text explaining the last administrative status change.
    pub user_status: Option<String>,
    pub country_iso: String,
    pub comment: String,
    /// Destination type label, used by the `types` browsing domain.
    pub type_label: String,
    /// Owning user, shown as the owner in data listings.
    pub ecuser: String,
    /// Data files are grouped in per-day directories.
    pub group_by_date: bool,
    pub max_bytes_per_sec: Option<u64>,
    pub scheduler: SchedulerValue,
}

impl Destination {
    /// A freshly created destination: `INIT` status and a new scheduler value.
    pub fn new(name: impl Into<String>, country_iso: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            status: DestinationStatus::Init,
            user_status: None,
            country_iso: country_iso.into(),
            comment: String::new(),
            type_label: "Unknown".to_string(),
            ecuser: "ecpds".to_string(),
            group_by_date: false,
            max_bytes_per_sec: None,
            scheduler: SchedulerValue::default(),
        }
    }
}

/// Role a host plays for its destinations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Dissemination,
    Acquisition,
    Source,
    Backup,
}

/// A remote endpoint reachable through a mover of its transfer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub active: bool,
    pub kind: HostKind,
    pub transfer_group: String,
    pub address: String,
    pub login: String,
    pub directory: String,
}

/// Link between a destination and one of its hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub destination: String,
    pub host: String,
    pub priority: i32,
}

/// A mover node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferServer {
    pub name: String,
    pub transfer_group: String,
    pub address: String,
    pub port: u16,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub iso: String,
    pub name: String,
}

/// The payload shared by every transfer created from one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    pub id: DataFileId,
    pub original: String,
    pub size: u64,
    /// The bytes are available on a mover.
    pub downloaded: bool,
    pub deleted: bool,
    pub arrived_time: DateTime<Utc>,
    /// Mover currently holding the bytes.
    pub mover: Option<String>,
}

/// One scheduled movement of one DataFile to one Destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransfer {
    pub id: TransferId,
    pub destination: String,
    pub data_file_id: DataFileId,
    /// Target file name at the destination.
    pub target: String,
    pub status: TransferStatus,
    /// 0 (highest) to 99.
    pub priority: i32,
    pub asap: bool,
    pub scheduled_time: DateTime<Utc>,
    pub queue_time: DateTime<Utc>,
    pub retry_time: Option<DateTime<Utc>>,
    pub expiry_time: DateTime<Utc>,
    pub failed_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub comment: String,
    pub size: u64,
}

impl DataTransfer {
    /// Directory name used when the destination groups files by date.
    pub fn date_directory(&self) -> String {
        self.queue_time.format("%Y%m%d").to_string()
    }
}

/// One line of a transfer's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferHistory {
    pub transfer_id: TransferId,
    pub destination: String,
    pub status: TransferStatus,
    pub comment: String,
    pub actor: String,
    pub time: DateTime<Utc>,
}

/// Result of an audited administrative operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure(String),
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// Emitted for every administrative operation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: String,
    pub operation: String,
    pub target: String,
    pub outcome: AuditOutcome,
    pub time: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor: impl Into<String>,
        operation: impl Into<String>,
        target: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            actor: actor.into(),
            operation: operation.into(),
            target: target.into(),
            outcome,
            time: Utc::now(),
        }
    }
}

/// Permission string of virtual directories in listings.
pub const DIRECTORY_PERMISSION: &str = "drwxr-x---";
/// Permission string of plain files in listings.
pub const FILE_PERMISSION: &str = "-rw-r--r--";
/// Size reported for virtual directories.
pub const DIRECTORY_SIZE: u64 = 2048;

/// Uniform listing record, independent of the domain that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListElement {
    pub name: String,
    pub permission: String,
    pub owner: String,
    pub group: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub comment: Option<String>,
}

impl FileListElement {
    /// A virtual directory entry.
    pub fn directory(
        name: impl Into<String>,
        owner: impl Into<String>,
        group: impl Into<String>,
        comment: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            permission: DIRECTORY_PERMISSION.to_string(),
            owner: owner.into(),
            group: group.into(),
            size: DIRECTORY_SIZE,
            mtime: Utc::now(),
            comment,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.permission.starts_with('d')
    }

    /// Render as an `ls -l` style line.
    pub fn to_ftp_line(&self) -> String {
        format!(
            "{} 1 {:<8} {:<8} {:>12} {} {}",
            self.permission,
            self.owner,
            self.group,
            self.size,
            self.mtime.format("%b %d %H:%M"),
            self.name
        )
    }
}

/// What an authorization check is asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Destination(String),
    Host(String),
    Country(String),
    Type(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destination(name) => write!(f, "destination {name}"),
            Self::Host(name) => write!(f, "host {name}"),
            Self::Country(iso) => write!(f, "country {iso}"),
            Self::Type(label) => write!(f, "type {label}"),
        }
    }
}

/// Direction of a ticket-brokered operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Read,
    Write,
}

/// Network endpoint a mover exposes for one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoverEndpoint {
    pub host: String,
    pub port: u16,
    /// The client connects to the mover (true) or waits for the mover (false).
    pub client_initiates: bool,
}
