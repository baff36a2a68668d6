// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `data` domain: a destination's transfers seen as files.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use ecpds_cache::{CachedStore, DestinationSnapshot};
use ecpds_core::types::{
    DataFile, DataTransfer, FILE_PERMISSION, FileListElement, TransferId, TransferStatus,
};
use ecpds_core::{EcpdsError, PersistentStore};

use crate::attachments::{AttachmentStore, Scope};

/// Prefix addressing a transfer by id instead of by name.
pub const TRANSFER_ID_PREFIX: &str = "DataTransferId=";

/// What a path below a destination designates.
#[derive(Debug, Clone)]
pub enum DataEntry {
    /// The destination itself, a date directory or a marker directory.
    Directory(Vec<String>),
    File {
        transfer: DataTransfer,
        data_file: DataFile,
    },
}

/// A transfer can be served once it is due, downloaded, live and past `INIT`.
pub fn is_available(transfer: &DataTransfer, data_file: &DataFile, now: DateTime<Utc>) -> bool {
    (transfer.asap || transfer.scheduled_time <= now)
        && data_file.downloaded
        && !data_file.deleted
        && !transfer.deleted
        && transfer.status != TransferStatus::Init
}

fn is_date(segment: &str) -> bool {
    segment.len() == 8 && NaiveDate::parse_from_str(segment, "%Y%m%d").is_ok()
}

/// Name of a transfer inside its directory.
pub fn file_name(snapshot: &DestinationSnapshot, transfer: &DataTransfer) -> String {
    if snapshot.destination.group_by_date {
        transfer.target.rsplit('/').next().unwrap_or_default().to_string()
    } else {
        transfer.target.clone()
    }
}

pub fn file_element(
    snapshot: &DestinationSnapshot,
    transfer: &DataTransfer,
    name: String,
) -> FileListElement {
    let owner = snapshot
        .users
        .first()
        .cloned()
        .unwrap_or_else(|| snapshot.destination.ecuser.clone());
    FileListElement {
        name,
        permission: FILE_PERMISSION.to_string(),
        owner,
        group: snapshot.destination.country_iso.clone(),
        size: transfer.size,
        mtime: transfer.queue_time,
        comment: Some(transfer.id.to_string()),
    }
}

/// Data-domain reads over the cached store.
pub struct DataDomain<'a> {
    pub store: &'a CachedStore,
    pub attachments: &'a AttachmentStore,
}

impl DataDomain<'_> {
    /// Transfers of the destination that can be served now, with their files.
    pub async fn available(
        &self,
        snapshot: &DestinationSnapshot,
    ) -> Result<Vec<(DataTransfer, DataFile)>, EcpdsError> {
        let now = Utc::now();
        let mut served = Vec::new();
        for transfer in self
            .store
            .list_destination_transfers(&snapshot.destination.name)
            .await?
        {
            let Some(data_file) = self.store.get_data_file(transfer.data_file_id).await? else {
                continue;
            };
            if is_available(&transfer, &data_file, now) {
                served.push((transfer, data_file));
            }
        }
        Ok(served)
    }

    async fn by_id(
        &self,
        snapshot: &DestinationSnapshot,
        raw: &str,
    ) -> Result<(DataTransfer, DataFile), EcpdsError> {
        let id = raw
            .parse::<i64>()
            .map(TransferId)
            .map_err(|_| EcpdsError::NotFound(format!("{TRANSFER_ID_PREFIX}{raw}")))?;
        let transfer = self
            .store
            .get_data_transfer(id)
            .await?
            .filter(|t| t.destination == snapshot.destination.name)
            .ok_or_else(|| EcpdsError::NotFound(format!("transfer {id}")))?;
        let data_file = self
            .store
            .get_data_file(transfer.data_file_id)
            .await?
            .ok_or_else(|| EcpdsError::NotFound(format!("data file {}", transfer.data_file_id)))?;
        if !is_available(&transfer, &data_file, Utc::now()) {
            return Err(EcpdsError::NotFound(format!("transfer {id} not available")));
        }
        Ok((transfer, data_file))
    }

    /// Resolve the segments below a destination.
    ///
    /// Names are tried as a `DataTransferId=` reference first, then as
    /// `<yyyymmdd>/<target>` when grouped by date, then as the target.
    pub async fn entry(
        &self,
        snapshot: &DestinationSnapshot,
        segments: &[String],
    ) -> Result<DataEntry, EcpdsError> {
        let Some(last) = segments.last() else {
            return Ok(DataEntry::Directory(Vec::new()));
        };
        if let Some(raw) = last.strip_prefix(TRANSFER_ID_PREFIX) {
            let (transfer, data_file) = self.by_id(snapshot, raw).await?;
            return Ok(DataEntry::File {
                transfer,
                data_file,
            });
        }

        let not_found = || EcpdsError::NotFound(format!("{}/{}", snapshot.destination.name, segments.join("/")));
        let available = self.available(snapshot).await?;
        let newest = |matches: &dyn Fn(&DataTransfer) -> bool| {
            available
                .iter()
                .filter(|(t, _)| matches(t))
                .max_by_key(|(t, _)| (t.queue_time, t.id))
                .cloned()
        };

        if snapshot.destination.group_by_date {
            return match segments {
                [date] if is_date(date) => Ok(DataEntry::Directory(vec![date.clone()])),
                [date, name] => newest(&|t| t.date_directory() == *date && file_name(snapshot, t) == *name)
                    .map(|(transfer, data_file)| DataEntry::File {
                        transfer,
                        data_file,
                    })
                    .ok_or_else(not_found),
                _ => Err(not_found()),
            };
        }

        let target = segments.join("/");
        if let Some((transfer, data_file)) = newest(&|t| t.target == target) {
            return Ok(DataEntry::File {
                transfer,
                data_file,
            });
        }
        let nested = format!("{target}/");
        if available.iter().any(|(t, _)| t.target.starts_with(&nested)) {
            return Ok(DataEntry::Directory(segments.to_vec()));
        }
        let scope = Scope::Destination(snapshot.destination.name.clone());
        if self.attachments.has_marker(&scope, segments).await {
            return Ok(DataEntry::Directory(segments.to_vec()));
        }
        Err(not_found())
    }

    /// Entries of a data directory.
    pub async fn list(
        &self,
        snapshot: &DestinationSnapshot,
        directory: &[String],
    ) -> Result<Vec<FileListElement>, EcpdsError> {
        let available = self.available(snapshot).await?;
        let dest = &snapshot.destination;
        let mut listing = Vec::new();

        match (dest.group_by_date, directory) {
            (true, []) => {
                let dates: BTreeSet<String> =
                    available.iter().map(|(t, _)| t.date_directory()).collect();
                for date in dates {
                    listing.push(FileListElement::directory(
                        date,
                        dest.ecuser.clone(),
                        dest.country_iso.clone(),
                        None,
                    ));
                }
            }
            (true, [date]) => {
                for (transfer, _) in available.iter().filter(|(t, _)| t.date_directory() == *date) {
                    listing.push(file_element(snapshot, transfer, file_name(snapshot, transfer)));
                }
            }
            (true, _) => {}
            (false, _) => {
                let prefix = if directory.is_empty() {
                    String::new()
                } else {
                    format!("{}/", directory.join("/"))
                };
                let mut seen_dirs = BTreeSet::new();
                for (transfer, _) in &available {
                    let Some(rest) = transfer.target.strip_prefix(prefix.as_str()) else {
                        continue;
                    };
                    match rest.split_once('/') {
                        None => listing.push(file_element(snapshot, transfer, rest.to_string())),
                        Some((dir, _)) => {
                            seen_dirs.insert(dir.to_string());
                        }
                    }
                }
                if directory.is_empty() {
                    let scope = Scope::Destination(dest.name.clone());
                    seen_dirs.extend(self.attachments.marker_dirs(&scope).await);
                }
                for dir in seen_dirs {
                    listing.push(FileListElement::directory(
                        dir,
                        dest.ecuser.clone(),
                        dest.country_iso.clone(),
                        None,
                    ));
                }
            }
        }
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }
}

/// Target name of an upload below a destination.
///
/// Destinations grouped by date accept `name` (today's directory) or
/// `yyyymmdd/name`; anything deeper is refused.
pub fn upload_target(
    snapshot: &DestinationSnapshot,
    segments: &[String],
    today: DateTime<Utc>,
) -> Result<String, EcpdsError> {
    let dest = &snapshot.destination.name;
    if segments.is_empty() {
        return Err(EcpdsError::PermissionDenied(format!(
            "{dest}: not a plain file"
        )));
    }
    if !snapshot.destination.group_by_date {
        return Ok(segments.join("/"));
    }
    match segments {
        [name] => Ok(format!("{}/{name}", today.format("%Y%m%d"))),
        [date, name] if is_date(date) => Ok(format!("{date}/{name}")),
        [date, _] => Err(EcpdsError::PermissionDenied(format!(
            "{dest}/{date}: not a date directory"
        ))),
        _ => Err(EcpdsError::PermissionDenied(format!(
            "{dest}/{}: too many segments for a destination grouped by date",
            segments.join("/")
        ))),
    }
}
