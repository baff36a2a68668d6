// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket descriptors and issued tickets.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use ecpds_core::{DataFileId, Direction, TicketId, TransferId};

/// The physical resource a ticket authorizes access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TicketTarget {
    /// A file in the attachment store, scoped by destination name or type.
    Attachment { scope: String, path: String },
    /// The data file behind a transfer, served by the mover holding it.
    DataFile {
        destination: String,
        path: String,
        transfer: TransferId,
        data_file: DataFileId,
    },
    /// A new data file pushed to a destination through the master.
    Upload { destination: String, path: String },
    /// A path on a remote host, reached through a mover.
    Mover {
        server: String,
        host: String,
        path: String,
    },
}

impl TicketTarget {
    /// Owning scope, used in logs.
    pub fn scope(&self) -> &str {
        match self {
            Self::Attachment { scope, .. } => scope,
            Self::DataFile { destination, .. } | Self::Upload { destination, .. } => destination,
            Self::Mover { host, .. } => host,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Attachment { path, .. }
            | Self::DataFile { path, .. }
            | Self::Upload { path, .. }
            | Self::Mover { path, .. } => path,
        }
    }
}

/// What the caller asks the repository to authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDescriptor {
    pub target: TicketTarget,
    pub direction: Direction,
    pub offset: u64,
    pub length: Option<u64>,
    pub umask: Option<u32>,
    /// Overrides the repository's ticket lifetime when shorter.
    pub timeout: Option<Duration>,
}

impl TicketDescriptor {
    pub fn read(target: TicketTarget, offset: u64) -> Self {
        Self {
            target,
            direction: Direction::Read,
            offset,
            length: None,
            umask: None,
            timeout: None,
        }
    }

    pub fn write(target: TicketTarget, offset: u64) -> Self {
        Self {
            target,
            direction: Direction::Write,
            offset,
            length: None,
            umask: None,
            timeout: None,
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = Some(umask);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A registered, not yet consumed authorization.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: TicketId,
    pub target: TicketTarget,
    pub direction: Direction,
    pub offset: u64,
    pub length: Option<u64>,
    pub umask: Option<u32>,
    pub created_at: DateTime<Utc>,
    /// Past this instant the ticket can no longer be redeemed or checked.
    pub deadline: Instant,
}

impl Ticket {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

/// What the party performing the I/O reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Completion {
    Succeeded {
        bytes: u64,
        /// Set by upload receivers once the new data file is registered.
        #[serde(default)]
        data_file: Option<DataFileId>,
    },
    Failed { reason: String },
}
