// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical paths and the browsing domains they select.

use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumString};

use ecpds_core::EcpdsError;

/// First segment of every logical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Domain {
    Destinations,
    Hosts,
    Countries,
    Attachments,
    Data,
    Types,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Self::Destinations,
        Self::Hosts,
        Self::Countries,
        Self::Attachments,
        Self::Data,
        Self::Types,
    ];

    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Destinations | Self::Hosts | Self::Countries => Capabilities {
                range_reads: true,
                creation: true,
                directories: DirectorySupport::Mover,
            },
            Self::Attachments | Self::Types => Capabilities {
                range_reads: false,
                creation: true,
                directories: DirectorySupport::None,
            },
            Self::Data => Capabilities {
                range_reads: false,
                creation: true,
                directories: DirectorySupport::Markers,
            },
        }
    }
}

/// How a domain handles `mkdir` / `rmdir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySupport {
    /// Never supported.
    None,
    /// Forwarded when the mover exposes directories for the host.
    Mover,
    /// Marker files, refused for destinations grouped by date.
    Markers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `offset + length` reads are honoured.
    pub range_reads: bool,
    pub creation: bool,
    pub directories: DirectorySupport,
}

/// A domain selector followed by the segments still to be consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPath {
    pub domain: Domain,
    pub segments: Vec<String>,
}

impl LogicalPath {
    pub fn parse(path: &str) -> Result<Self, EcpdsError> {
        let mut tokens = path.split('/').filter(|t| !t.is_empty());
        let Some(tag) = tokens.next() else {
            return Err(EcpdsError::NotFound("empty path".to_string()));
        };
        let domain = Domain::from_str(tag)
            .map_err(|_| EcpdsError::NotFound(format!("{tag}: not a registered domain")))?;

        let mut segments = Vec::new();
        for token in tokens {
            if token == "." {
                continue;
            }
            if token == ".." {
                return Err(EcpdsError::PermissionDenied(format!(
                    "{path}: path escapes its domain"
                )));
            }
            segments.push(token.to_string());
        }
        Ok(Self { domain, segments })
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
