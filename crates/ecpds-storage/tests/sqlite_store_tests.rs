// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SqliteStore against a real database file.

use ecpds_config::model::StorageConfig;
use ecpds_core::types::{
    Association, AuditOutcome, AuditRecord, DestinationStatus, HealthStatus, TransferHistory,
    TransferId, TransferStatus,
};
use ecpds_core::{AuditSink, EcpdsError, PersistentStore, PluginAdapter};
use ecpds_storage::SqliteStore;
use ecpds_test_utils::fixtures;

async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
    let config = StorageConfig {
        database_path: dir.path().join("ecpds.db").to_string_lossy().into_owned(),
        wal_mode: true,
    };
    let store = SqliteStore::new(config);
    store.initialize().await.unwrap();
    store
}

#[tokio::test]
async fn uninitialized_store_reports_unhealthy() {
    let store = SqliteStore::new(StorageConfig::default());
    assert!(matches!(
        store.health_check().await.unwrap(),
        HealthStatus::Unhealthy(_)
    ));
    let err = store.list_destinations().await.unwrap_err();
    assert!(matches!(err, EcpdsError::Storage { .. }));
}

#[tokio::test]
async fn destination_crud() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);

    let mut dest = fixtures::destination("DEST1");
    dest.max_bytes_per_sec = Some(4096);
    store.insert_destination(&dest).await.unwrap();
    let err = store.insert_destination(&dest).await.unwrap_err();
    assert!(matches!(err, EcpdsError::AlreadyExists(_)));

    dest.status = DestinationStatus::Stop;
    dest.user_status = Some("admin".to_string());
    dest.scheduler.start_count = 3;
    store.update_destination(&dest).await.unwrap();
    assert_eq!(store.get_destination("DEST1").await.unwrap(), Some(dest));

    let missing = fixtures::destination("NOPE");
    let err = store.update_destination(&missing).await.unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
    assert!(store.get_destination("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn removing_a_destination_cascades() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let id = fixtures::seed_destination(&store, "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    store.add_alias("DEST1", "ALIAS1").await.unwrap();
    store.add_destination_user("DEST1", "alice").await.unwrap();
    store.add_destination_user("DEST1", "alice").await.unwrap();
    store.grant_incoming("DEST1", "bob").await.unwrap();

    assert_eq!(store.list_aliases("DEST1").await.unwrap(), vec!["ALIAS1"]);
    assert_eq!(store.list_destination_users("DEST1").await.unwrap(), vec!["alice"]);

    assert!(store.remove_destination("DEST1").await.unwrap());
    assert!(!store.remove_destination("DEST1").await.unwrap());
    assert!(store.get_data_transfer(id).await.unwrap().is_none());
    assert!(store.list_associations("DEST1").await.unwrap().is_empty());
    assert!(store.list_aliases("DEST1").await.unwrap().is_empty());
    assert_eq!(store.remove_incoming_permissions("DEST1").await.unwrap(), 0);
}

#[tokio::test]
async fn hosts_and_associations() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    store.insert_destination(&fixtures::destination("DEST1")).await.unwrap();
    store.insert_host(&fixtures::host("h2", "group-a")).await.unwrap();
    store.insert_host(&fixtures::acquisition_host("h1", "group-b")).await.unwrap();
    for (host, priority) in [("h2", 0), ("h1", 5)] {
        store
            .insert_association(&Association {
                destination: "DEST1".to_string(),
                host: host.to_string(),
                priority,
            })
            .await
            .unwrap();
    }
    let err = store
        .insert_association(&Association {
            destination: "DEST1".to_string(),
            host: "h2".to_string(),
            priority: 9,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::AlreadyExists(_)));

    let hosts: Vec<_> = store
        .list_associations("DEST1")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.host)
        .collect();
    assert_eq!(hosts, vec!["h2", "h1"]);
    assert_eq!(store.list_host_destinations("h1").await.unwrap(), vec!["DEST1"]);

    let mut h1 = store.get_host("h1").await.unwrap().unwrap();
    h1.active = false;
    store.update_host(&h1).await.unwrap();
    assert!(!store.get_host("h1").await.unwrap().unwrap().active);

    assert!(store.remove_host("h1").await.unwrap());
    assert!(store.list_host_destinations("h1").await.unwrap().is_empty());
    assert_eq!(store.list_hosts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn servers_and_countries() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    store.insert_transfer_server(&fixtures::server("mover-1", "group-a")).await.unwrap();
    let err = store
        .insert_transfer_server(&fixtures::server("mover-1", "group-b"))
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::AlreadyExists(_)));
    assert_eq!(
        store.get_transfer_server("mover-1").await.unwrap(),
        Some(fixtures::server("mover-1", "group-a"))
    );

    store.insert_country(&fixtures::country("it", "Italy")).await.unwrap();
    store.insert_country(&fixtures::country("fr", "France")).await.unwrap();
    let isos: Vec<_> = store
        .list_countries()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.iso)
        .collect();
    assert_eq!(isos, vec!["fr", "it"]);
}

#[tokio::test]
async fn transfers_keep_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    store.insert_destination(&fixtures::destination("DEST1")).await.unwrap();
    let file_id = store
        .insert_data_file(&fixtures::data_file("a.bin", 1 << 40))
        .await
        .unwrap();
    let mut file = fixtures::data_file("a.bin", 1 << 40);
    file.id = file_id;
    assert_eq!(store.get_data_file(file_id).await.unwrap(), Some(file));

    let mut transfer = fixtures::transfer("DEST1", file_id, "a.bin", TransferStatus::Wait);
    transfer.id = store.insert_data_transfer(&transfer).await.unwrap();
    assert_eq!(
        store.get_data_transfer(transfer.id).await.unwrap(),
        Some(transfer.clone())
    );

    transfer.status = TransferStatus::Done;
    transfer.finish_time = Some(chrono::Utc::now());
    transfer.comment = "delivered".to_string();
    store.update_data_transfer(&transfer).await.unwrap();
    assert_eq!(
        store.get_data_transfer(transfer.id).await.unwrap(),
        Some(transfer.clone())
    );

    let mut ghost = transfer.clone();
    ghost.id = TransferId(9999);
    let err = store.update_data_transfer(&ghost).await.unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
}

#[tokio::test]
async fn listings_skip_deleted_transfers() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let first = fixtures::seed_destination(&store, "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    let mut transfer = store.get_data_transfer(first).await.unwrap().unwrap();
    let file_id = transfer.data_file_id;
    let second = store
        .insert_data_transfer(&fixtures::transfer("DEST1", file_id, "b.bin", TransferStatus::Hold))
        .await
        .unwrap();

    transfer.deleted = true;
    store.update_data_transfer(&transfer).await.unwrap();

    let live: Vec<_> = store
        .list_destination_transfers("DEST1")
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(live, vec![second]);
    assert_eq!(store.list_data_file_transfers(file_id).await.unwrap().len(), 1);

    assert!(store.remove_data_transfer(second).await.unwrap());
    assert!(!store.remove_data_transfer(second).await.unwrap());
    assert!(store.remove_data_file(file_id).await.unwrap());
    assert!(store.get_data_file(file_id).await.unwrap().is_none());
}

#[tokio::test]
async fn history_is_returned_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    let id = fixtures::seed_destination(&store, "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    for (status, comment) in [
        (TransferStatus::Hold, "put on hold"),
        (TransferStatus::Wait, "requeued"),
    ] {
        store
            .insert_transfer_history(&TransferHistory {
                transfer_id: id,
                destination: "DEST1".to_string(),
                status,
                comment: comment.to_string(),
                actor: "admin".to_string(),
                time: chrono::Utc::now(),
            })
            .await
            .unwrap();
    }
    let comments: Vec<_> = store
        .list_transfer_history(id)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.comment)
        .collect();
    assert_eq!(comments, vec!["put on hold", "requeued"]);
}

#[tokio::test]
async fn audit_records_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;
    store
        .record(&AuditRecord::new("admin", "hold", "DEST1", AuditOutcome::Success))
        .await
        .unwrap();
    store
        .record(&AuditRecord::new(
            "admin",
            "restart",
            "DEST1",
            AuditOutcome::Failure("invalid transition".to_string()),
        ))
        .await
        .unwrap();
    store
        .record(&AuditRecord::new("admin", "hold", "DEST2", AuditOutcome::Success))
        .await
        .unwrap();

    let dest1 = store.list_audit(Some("DEST1"), 10).await.unwrap();
    assert_eq!(dest1.len(), 2);
    assert_eq!(dest1[0].operation, "restart");
    assert_eq!(
        dest1[0].outcome,
        AuditOutcome::Failure("invalid transition".to_string())
    );
    assert_eq!(dest1[1].outcome, AuditOutcome::Success);

    let latest = store.list_audit(None, 1).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].target, "DEST2");
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(&dir).await;
        store.insert_destination(&fixtures::destination("DEST1")).await.unwrap();
        store.shutdown().await.unwrap();
    }
    let store = open_store(&dir).await;
    assert!(store.get_destination("DEST1").await.unwrap().is_some());
}
