// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for domain records used across tests.

use chrono::{Duration, Utc};

use ecpds_core::types::{
    Association, Country, DataFile, DataFileId, DataTransfer, Destination, DestinationStatus,
    Host, HostKind, TransferId, TransferServer, TransferStatus,
};
use ecpds_core::PersistentStore;
use ecpds_core::EcpdsError;

/// An active, queued destination in country `fr`.
pub fn destination(name: &str) -> Destination {
    let mut dest = Destination::new(name, "fr");
    dest.status = DestinationStatus::Wait;
    dest.type_label = "Member".to_string();
    dest
}

pub fn host(name: &str, transfer_group: &str) -> Host {
    Host {
        name: name.to_string(),
        active: true,
        kind: HostKind::Dissemination,
        transfer_group: transfer_group.to_string(),
        address: format!("{name}.example.org"),
        login: "ecpds".to_string(),
        directory: "/incoming".to_string(),
    }
}

pub fn acquisition_host(name: &str, transfer_group: &str) -> Host {
    Host {
        kind: HostKind::Acquisition,
        ..host(name, transfer_group)
    }
}

pub fn server(name: &str, transfer_group: &str) -> TransferServer {
    TransferServer {
        name: name.to_string(),
        transfer_group: transfer_group.to_string(),
        address: format!("{name}.movers.example.org"),
        port: 9140,
        active: true,
    }
}

pub fn country(iso: &str, name: &str) -> Country {
    Country {
        iso: iso.to_string(),
        name: name.to_string(),
    }
}

/// A downloaded data file held by `mover-1`.
pub fn data_file(original: &str, size: u64) -> DataFile {
    DataFile {
        id: DataFileId(0),
        original: original.to_string(),
        size,
        downloaded: true,
        deleted: false,
        arrived_time: Utc::now(),
        mover: Some("mover-1".to_string()),
    }
}

/// A transfer ready to be served: scheduled in the past, expiring in a day.
pub fn transfer(
    destination: &str,
    data_file_id: DataFileId,
    target: &str,
    status: TransferStatus,
) -> DataTransfer {
    let now = Utc::now();
    DataTransfer {
        id: TransferId(0),
        destination: destination.to_string(),
        data_file_id,
        target: target.to_string(),
        status,
        priority: 50,
        asap: false,
        scheduled_time: now - Duration::minutes(5),
        queue_time: now - Duration::minutes(5),
        retry_time: None,
        expiry_time: now + Duration::days(1),
        failed_time: None,
        finish_time: None,
        deleted: false,
        comment: String::new(),
        size: 1024,
    }
}

/// Seed a destination with one server, one associated host and one file.
///
/// Returns the id of the transfer created for `target`.
pub async fn seed_destination(
    store: &dyn PersistentStore,
    name: &str,
    target: &str,
    status: TransferStatus,
) -> Result<TransferId, EcpdsError> {
    store.insert_destination(&destination(name)).await?;
    if store.get_transfer_server("mover-1").await?.is_none() {
        store.insert_transfer_server(&server("mover-1", "group-a")).await?;
    }
    let host_name = format!("{}-host", name.to_lowercase());
    store.insert_host(&host(&host_name, "group-a")).await?;
    store
        .insert_association(&Association {
            destination: name.to_string(),
            host: host_name,
            priority: 0,
        })
        .await?;
    let file_id = store.insert_data_file(&data_file(target, 1024)).await?;
    store
        .insert_data_transfer(&transfer(name, file_id, target, status))
        .await
}
