// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical path operations and ticket flows through the full master stack.

use std::time::Duration;

use ecpds_core::types::{Resource, TransferStatus};
use ecpds_core::{Direction, EcpdsError, PersistentStore};
use ecpds_test_utils::TestHarness;
use ecpds_test_utils::fixtures;
use ecpds_ticket::Completion;

fn names(listing: &[ecpds_core::FileListElement]) -> Vec<&str> {
    listing.iter().map(|e| e.name.as_str()).collect()
}

#[tokio::test]
async fn destinations_listing_hides_inactive_and_denied() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    h.seed("DEST2", "b.bin", TransferStatus::Wait).await.unwrap();
    let mut dormant = fixtures::destination("DEST3");
    dormant.active = false;
    h.memory.put_destination(dormant).await;
    h.authorizer
        .deny(Resource::Destination("DEST2".to_string()))
        .await;

    let listing = h.proxy.list(&TestHarness::admin(), "destinations").await.unwrap();
    assert_eq!(names(&listing), vec!["DEST1"]);
    assert!(listing[0].is_directory());

    let err = h
        .proxy
        .list(&TestHarness::admin(), "destinations/DEST2")
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::PermissionDenied(_)));
}

#[tokio::test]
async fn unknown_domain_is_not_found() {
    let h = TestHarness::builder().build().unwrap();
    let err = h.proxy.list(&TestHarness::admin(), "tapes/x").await.unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
}

#[tokio::test]
async fn data_reads_refuse_ranges() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();

    let err = h
        .proxy
        .get_input(&admin, "data/DEST1/a.bin", 0, Some(10))
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::RangeNotSupported(_)));
    assert!(h.tickets.is_empty());

    let socket = h
        .proxy
        .get_input(&admin, "data/DEST1/a.bin", 0, None)
        .await
        .unwrap();
    assert_eq!(socket.host, "mover-1.movers.example.org");
    assert_eq!(socket.domain, "data");
    let ticket = h.tickets.get(socket.ticket).unwrap();
    assert_eq!(ticket.direction, Direction::Read);

    let prepared = h.mover.prepared_requests().await;
    assert_eq!(prepared.len(), 1);
    assert!(prepared[0].host.is_none());
    assert!(prepared[0].data_file.is_some());
}

#[tokio::test]
async fn mover_domains_honour_ranges() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    h.mover.put_file("dest1-host", "outgoing/x.bin", 100).await;

    let socket = h
        .proxy
        .get_input(
            &TestHarness::admin(),
            "destinations/DEST1/mover-1/dest1-host/outgoing/x.bin",
            20,
            Some(5),
        )
        .await
        .unwrap();
    assert_eq!(socket.port, 9140);
    assert!(socket.initiates_connection);

    let prepared = h.mover.prepared_requests().await;
    assert_eq!(prepared[0].offset, 20);
    assert_eq!(prepared[0].length, Some(5));
    assert_eq!(prepared[0].path, "outgoing/x.bin");
    assert_eq!(prepared[0].host.as_ref().map(|h| h.name.as_str()), Some("dest1-host"));
}

#[tokio::test]
async fn missing_remote_file_issues_no_ticket() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let err = h
        .proxy
        .get_input(&TestHarness::admin(), "hosts/mover-1/dest1-host/nope", 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
    assert!(h.tickets.is_empty());
}

#[tokio::test]
async fn failed_prepare_withdraws_the_ticket() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    h.mover.set_failing(true);
    let err = h
        .proxy
        .get_input(&TestHarness::admin(), "data/DEST1/a.bin", 0, None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(h.tickets.is_empty());
}

#[tokio::test]
async fn directories_are_not_plain_files() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();

    for path in ["data/DEST1", "destinations/DEST1/mover-1", "countries"] {
        let err = h.proxy.size(&admin, path).await.unwrap_err();
        assert!(
            matches!(&err, EcpdsError::PermissionDenied(m) if m.contains("not a plain file")),
            "{path}: {err}"
        );
    }
    assert_eq!(h.proxy.size(&admin, "data/DEST1/a.bin").await.unwrap(), 1024);
}

#[tokio::test]
async fn mkdir_depends_on_the_domain() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();

    let err = h.proxy.mkdir(&admin, "attachments/DEST1/docs").await.unwrap_err();
    assert!(matches!(err, EcpdsError::PermissionDenied(_)));

    let remote = "destinations/DEST1/mover-1/dest1-host/newdir";
    let err = h.proxy.mkdir(&admin, remote).await.unwrap_err();
    assert!(matches!(err, EcpdsError::PermissionDenied(_)));
    h.mover.set_supports_directories(true);
    h.proxy.mkdir(&admin, remote).await.unwrap();
    assert_eq!(
        h.mover.created_directories().await,
        vec![("dest1-host".to_string(), "newdir".to_string())]
    );

    h.proxy.mkdir(&admin, "data/DEST1/incoming").await.unwrap();
    let listing = h.proxy.list(&admin, "data/DEST1").await.unwrap();
    assert_eq!(names(&listing), vec!["a.bin", "incoming"]);
    h.proxy.rmdir(&admin, "data/DEST1/incoming").await.unwrap();
    let listing = h.proxy.list(&admin, "data/DEST1").await.unwrap();
    assert_eq!(names(&listing), vec!["a.bin"]);
}

#[tokio::test]
async fn grouped_destinations_refuse_data_directories() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let mut grouped = h.memory.get_destination("DEST1").await.unwrap().unwrap();
    grouped.group_by_date = true;
    h.store.update_destination(&grouped).await.unwrap();

    let err = h
        .proxy
        .mkdir(&TestHarness::admin(), "data/DEST1/incoming")
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::PermissionDenied(_)));
}

#[tokio::test]
async fn attachments_round_trip_through_the_filesystem() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();

    let socket = h
        .proxy
        .get_output(&admin, "attachments/DEST1/docs/readme.txt", 0, Some(0o022))
        .await
        .unwrap();
    assert_eq!(socket.host, "127.0.0.1");
    let ticket = h.tickets.get(socket.ticket).unwrap();
    assert_eq!(ticket.umask, Some(0o022));

    let scope = ecpds_proxy::Scope::Destination("DEST1".to_string());
    let file = h
        .proxy
        .attachments()
        .path(&scope, &["docs".to_string(), "readme.txt".to_string()]);
    tokio::fs::write(&file, b"hello").await.unwrap();

    let listing = h.proxy.list(&admin, "attachments/DEST1/docs").await.unwrap();
    assert_eq!(names(&listing), vec!["readme.txt"]);
    assert_eq!(
        h.proxy
            .size(&admin, "attachments/DEST1/docs/readme.txt")
            .await
            .unwrap(),
        5
    );

    h.proxy
        .rename(
            &admin,
            "attachments/DEST1/docs/readme.txt",
            "attachments/DEST1/README",
        )
        .await
        .unwrap();
    h.proxy.delete(&admin, "attachments/DEST1/README").await.unwrap();
    assert!(h.proxy.list(&admin, "attachments/DEST1/docs").await.unwrap().is_empty());
}

#[tokio::test]
async fn moves_stay_inside_one_domain() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let err = h
        .proxy
        .rename(&TestHarness::admin(), "attachments/DEST1/a", "data/DEST1/a")
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::PermissionDenied(m) if m.contains("across domains")));
}

#[tokio::test]
async fn download_records_history() {
    let h = TestHarness::builder().build().unwrap();
    let id = h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();

    let socket = h
        .proxy
        .get_input(&admin, "data/DEST1/a.bin", 0, None)
        .await
        .unwrap();
    h.serve(
        &socket,
        Completion::Succeeded {
            bytes: 1024,
            data_file: None,
        },
    )
    .unwrap();
    let completion = h.proxy.check(&admin, &socket, None).await.unwrap();
    assert!(matches!(completion, Completion::Succeeded { bytes: 1024, .. }));

    let history = h.memory.list_transfer_history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].comment, "Retrieved 1024 bytes");
    assert!(h.monitoring.wakeups() >= 1);
    assert!(h.tickets.is_empty());

    let err = h.proxy.check(&admin, &socket, None).await.unwrap_err();
    assert!(matches!(err, EcpdsError::TicketNotFound { .. }));
}

#[tokio::test]
async fn upload_links_history_to_the_new_file() {
    let h = TestHarness::builder().build().unwrap();
    let id = h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let file_id = h
        .memory
        .get_data_transfer(id)
        .await
        .unwrap()
        .unwrap()
        .data_file_id;
    let admin = TestHarness::admin();

    let err = h
        .proxy
        .get_output(&admin, "data/DEST1/new.bin", 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::RangeNotSupported(_)));

    let socket = h
        .proxy
        .get_output(&admin, "data/DEST1/new.bin", 0, None)
        .await
        .unwrap();
    h.serve(
        &socket,
        Completion::Succeeded {
            bytes: 10,
            data_file: Some(file_id),
        },
    )
    .unwrap();
    h.proxy.check(&admin, &socket, None).await.unwrap();

    let history = h.memory.list_transfer_history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].comment, "Uploaded as new.bin");
}

#[tokio::test(start_paused = true)]
async fn unfinished_transfer_expires_on_check() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();
    let socket = h
        .proxy
        .get_input(&admin, "data/DEST1/a.bin", 0, None)
        .await
        .unwrap();

    let err = h
        .proxy
        .check(&admin, &socket, Some(Duration::from_secs(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::TicketExpired { .. }));
    assert!(h.tickets.is_empty());
}

#[tokio::test]
async fn failed_transfer_surfaces_on_check() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();
    let socket = h
        .proxy
        .get_input(&admin, "data/DEST1/a.bin", 0, None)
        .await
        .unwrap();
    h.serve(
        &socket,
        Completion::Failed {
            reason: "connection reset".to_string(),
        },
    )
    .unwrap();
    let err = h.proxy.check(&admin, &socket, None).await.unwrap_err();
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn deleting_a_data_file_cleans_its_transfer() {
    let h = TestHarness::builder().build().unwrap();
    let id = h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let admin = TestHarness::admin();

    h.proxy.delete(&admin, "data/DEST1/a.bin").await.unwrap();
    let transfer = h.memory.get_data_transfer(id).await.unwrap().unwrap();
    assert!(transfer.deleted);
    assert_eq!(transfer.status, TransferStatus::Stop);

    let err = h.proxy.size(&admin, "data/DEST1/a.bin").await.unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
}
