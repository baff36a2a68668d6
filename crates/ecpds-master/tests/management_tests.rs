// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination lifecycle scenarios against the in-memory store and mocks.

use std::sync::Arc;

use chrono::{Duration, Utc};

use ecpds_cache::{CacheSettings, CachedStore};
use ecpds_core::types::{Association, DestinationStatus, Principal, TransferStatus};
use ecpds_core::{EcpdsError, PersistentStore, SchedulerKind};
use ecpds_master::{Collaborators, ManagementService, MasterSettings, TransitionKind};
use ecpds_test_utils::fixtures::{self, seed_destination};
use ecpds_test_utils::{
    MemoryStore, MockDispatch, MockMonitoring, MockRetrievalScheduler, RecordingAudit,
};

struct Rig {
    memory: Arc<MemoryStore>,
    store: Arc<CachedStore>,
    dispatch: Arc<MockDispatch>,
    ordinary: Arc<MockRetrievalScheduler>,
    acquisition: Arc<MockRetrievalScheduler>,
    monitoring: Arc<MockMonitoring>,
    audit: Arc<RecordingAudit>,
    service: Arc<ManagementService>,
    attachments: tempfile::TempDir,
}

fn rig() -> Rig {
    let memory = Arc::new(MemoryStore::new());
    let store = Arc::new(CachedStore::new(memory.clone(), CacheSettings::default()));
    let dispatch = Arc::new(MockDispatch::new());
    let ordinary = Arc::new(MockRetrievalScheduler::new(SchedulerKind::Ordinary));
    let acquisition = Arc::new(MockRetrievalScheduler::new(SchedulerKind::Acquisition));
    let monitoring = Arc::new(MockMonitoring::new());
    let audit = Arc::new(RecordingAudit::new());
    let attachments = tempfile::tempdir().unwrap();
    let settings = MasterSettings {
        cleanup_concurrency: 4,
        cleanup_queue: 2,
        attachments_dir: attachments.path().to_path_buf(),
    };
    let service = Arc::new(ManagementService::new(
        Collaborators {
            store: store.clone(),
            dispatch: dispatch.clone(),
            ordinary: ordinary.clone(),
            acquisition: acquisition.clone(),
            monitoring: monitoring.clone(),
            audit: audit.clone(),
        },
        settings,
    ));
    Rig {
        memory,
        store,
        dispatch,
        ordinary,
        acquisition,
        monitoring,
        audit,
        service,
        attachments,
    }
}

fn admin() -> Principal {
    Principal::new("admin")
}

#[tokio::test]
async fn graceful_hold_lets_work_drain() {
    let rig = rig();
    let id = seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Exec)
        .await
        .unwrap();
    rig.ordinary.start_retrieval(id, "DEST1").await;

    rig.service.hold(&admin(), "DEST1", true).await.unwrap();

    let dest = rig.store.get_destination("DEST1").await.unwrap().unwrap();
    assert_eq!(dest.status, DestinationStatus::Stop);
    assert_eq!(dest.user_status.as_deref(), Some("Graceful stop"));
    assert_eq!(rig.ordinary.in_flight().await, vec![id]);
    assert_eq!(rig.dispatch.shutdowns().await, vec![("DEST1".to_string(), true)]);
    assert_eq!(rig.monitoring.wakeups(), 1);
}

#[tokio::test]
async fn immediate_hold_interrupts_in_flight_retrievals() {
    let rig = rig();
    let id = seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Fetc)
        .await
        .unwrap();
    rig.memory
        .insert_host(&fixtures::acquisition_host("acq-1", "group-a"))
        .await
        .unwrap();
    rig.memory
        .insert_association(&Association {
            destination: "DEST1".into(),
            host: "acq-1".into(),
            priority: 1,
        })
        .await
        .unwrap();
    rig.ordinary.start_retrieval(id, "DEST1").await;

    rig.service.hold(&admin(), "DEST1", false).await.unwrap();

    assert_eq!(rig.ordinary.interrupted().await, vec![id]);
    assert!(rig.ordinary.in_flight().await.is_empty());
    assert_eq!(rig.acquisition.destination_interrupts().await, vec!["DEST1"]);
    assert_eq!(rig.acquisition.stopped_listings().await, vec!["acq-1"]);
    let dest = rig.store.get_destination("DEST1").await.unwrap().unwrap();
    assert_eq!(dest.user_status.as_deref(), Some("Immediate stop"));
}

#[tokio::test]
async fn hold_survives_stopped_schedulers() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    rig.ordinary.set_started(false);
    rig.acquisition.set_started(false);

    rig.service.hold(&admin(), "DEST1", false).await.unwrap();
    let dest = rig.store.get_destination("DEST1").await.unwrap().unwrap();
    assert_eq!(dest.status, DestinationStatus::Stop);
}

#[tokio::test]
async fn concurrent_holds_settle_on_one_status() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = Arc::clone(&rig.service);
        handles.push(tokio::spawn(async move {
            service.hold(&admin(), "DEST1", i % 2 == 0).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let dest = rig.memory.get_destination("DEST1").await.unwrap().unwrap();
    assert_eq!(dest.status, DestinationStatus::Stop);
    let summary = rig.audit.summary().await;
    assert_eq!(summary.len(), 8);
    assert!(summary.iter().all(|(op, _, ok)| op == "hold" && *ok));
}

#[tokio::test]
async fn restart_requeues_and_reschedules() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    rig.service.hold(&admin(), "DEST1", true).await.unwrap();
    rig.service.restart(&admin(), "DEST1", true).await.unwrap();

    let dest = rig.store.get_destination("DEST1").await.unwrap().unwrap();
    assert_eq!(dest.status, DestinationStatus::Wait);
    assert_eq!(dest.user_status, None);
    assert_eq!(dest.scheduler.start_count, 1);
    assert_eq!(rig.dispatch.rescheduled().await, vec!["DEST1"]);
}

#[tokio::test]
async fn idle_destination_with_pending_work_reports_scheduled() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    assert_eq!(
        rig.service.destination_status("DEST1").await.unwrap(),
        DestinationStatus::Sche
    );
}

#[tokio::test]
async fn hold_all_reports_per_destination() {
    let rig = rig();
    for name in ["DEST1", "DEST2", "DEST3"] {
        seed_destination(rig.memory.as_ref(), name, "a.bin", TransferStatus::Wait)
            .await
            .unwrap();
    }
    let outcome = rig.service.hold_all(&admin(), true).await.unwrap();
    assert_eq!(outcome.succeeded, 3);
    assert!(outcome.failed.is_empty());
    for dest in rig.memory.list_destinations().await.unwrap() {
        assert_eq!(dest.status, DestinationStatus::Stop);
    }

    let outcome = rig.service.restart_all(&admin(), false).await.unwrap();
    assert_eq!(outcome.succeeded, 3);
    for dest in rig.memory.list_destinations().await.unwrap() {
        assert_eq!(dest.status, DestinationStatus::Wait);
    }
}

#[tokio::test]
async fn unknown_destination_is_audited_as_failure() {
    let rig = rig();
    let err = rig.service.hold(&admin(), "NOPE", true).await.unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
    assert_eq!(
        rig.audit.summary().await,
        vec![("hold".to_string(), "NOPE".to_string(), false)]
    );
}

#[tokio::test]
async fn clean_only_keeps_live_transfers() {
    let rig = rig();
    let live = seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    let file_id = rig
        .memory
        .get_data_transfer(live)
        .await
        .unwrap()
        .unwrap()
        .data_file_id;
    let failed = rig
        .memory
        .insert_data_transfer(&fixtures::transfer("DEST1", file_id, "b.bin", TransferStatus::Fail))
        .await
        .unwrap();
    let mut expired = fixtures::transfer("DEST1", file_id, "c.bin", TransferStatus::Wait);
    expired.expiry_time = Utc::now() - Duration::hours(1);
    let expired = rig.memory.insert_data_transfer(&expired).await.unwrap();

    let report = rig
        .service
        .remove_destination(&admin(), "DEST1", false, true)
        .await
        .unwrap();
    assert_eq!(report.cleanup.submitted, 2);
    assert_eq!(report.cleanup.succeeded, 2);
    assert!(!report.destination_removed);

    let remaining: Vec<_> = rig
        .memory
        .list_destination_transfers("DEST1")
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(remaining, vec![live]);
    for id in [failed, expired] {
        assert!(rig.memory.get_data_transfer(id).await.unwrap().is_none());
    }
    assert!(rig.memory.get_data_file(file_id).await.unwrap().is_some());
    assert!(rig.store.get_destination("DEST1").await.unwrap().is_some());
}

#[tokio::test]
async fn cleanup_waits_for_a_status_update_on_the_same_transfer() {
    let rig = rig();
    let id = seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();

    let mut pause = rig.memory.pause_after("get_data_transfer");
    let updater = {
        let service = Arc::clone(&rig.service);
        tokio::spawn(async move {
            service
                .update_transfer_status(
                    &admin(),
                    id,
                    TransferStatus::Exec,
                    TransitionKind::Progress,
                    true,
                )
                .await
        })
    };
    pause.reached().await;

    let remover = {
        let service = Arc::clone(&rig.service);
        tokio::spawn(async move {
            service
                .remove_destination(&admin(), "DEST1", true, true)
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    pause.release();

    assert!(updater.await.unwrap().unwrap());
    let report = remover.await.unwrap().unwrap();
    assert_eq!(report.cleanup.succeeded, 1);

    assert!(rig.memory.list_destination_transfers("DEST1").await.unwrap().is_empty());
    assert!(rig.memory.get_data_transfer(id).await.unwrap().is_none());
    assert!(
        rig.service
            .update_transfer_status(&admin(), id, TransferStatus::Done, TransitionKind::Override, true)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn remove_tears_everything_down() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    seed_destination(rig.memory.as_ref(), "DEST2", "b.bin", TransferStatus::Wait)
        .await
        .unwrap();
    // DEST2's host is shared with DEST1.
    rig.memory
        .insert_association(&Association {
            destination: "DEST1".into(),
            host: "dest2-host".into(),
            priority: 1,
        })
        .await
        .unwrap();
    rig.memory.grant_incoming("DEST1", "alice").await;
    let attachments = rig.attachments.path().join("DEST1");
    std::fs::create_dir_all(&attachments).unwrap();
    std::fs::write(attachments.join("notes.txt"), b"x").unwrap();

    // Warm the caches so removal has something to invalidate.
    assert!(rig.store.get_destination("DEST1").await.unwrap().is_some());

    let report = rig
        .service
        .remove_destination(&admin(), "DEST1", true, false)
        .await
        .unwrap();

    assert!(report.destination_removed);
    assert_eq!(report.removed_hosts, vec!["dest1-host"]);
    assert_eq!(report.detached_hosts, vec!["dest2-host"]);
    assert_eq!(report.removed_permissions, 1);
    assert_eq!(report.cleanup.succeeded, 1);
    assert!(rig.store.get_destination("DEST1").await.unwrap().is_none());
    assert!(rig.store.get_host("dest1-host").await.unwrap().is_none());
    assert!(rig.store.get_host("dest2-host").await.unwrap().is_some());
    assert_eq!(rig.memory.incoming_permissions("DEST1").await, 0);
    assert!(!attachments.exists());
    assert_eq!(
        rig.store.list_associations("DEST2").await.unwrap().len(),
        1,
        "the sharing destination keeps its host"
    );
}

#[tokio::test]
async fn removing_twice_is_a_clean_not_found() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    rig.service
        .remove_destination(&admin(), "DEST1", true, false)
        .await
        .unwrap();

    let err = rig
        .service
        .remove_destination(&admin(), "DEST1", true, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EcpdsError::NotFound(_)));
    let summary = rig.audit.summary().await;
    let removes: Vec<_> = summary.iter().filter(|(op, _, _)| op == "remove").collect();
    assert_eq!(removes.len(), 2);
    assert!(removes[0].2);
    assert!(!removes[1].2);
}

#[tokio::test]
async fn large_backlog_is_cleaned_through_the_pool() {
    let rig = rig();
    let first = seed_destination(rig.memory.as_ref(), "DEST1", "f0.bin", TransferStatus::Wait)
        .await
        .unwrap();
    let file_id = rig
        .memory
        .get_data_transfer(first)
        .await
        .unwrap()
        .unwrap()
        .data_file_id;
    for i in 1..60 {
        rig.memory
            .insert_data_transfer(&fixtures::transfer(
                "DEST1",
                file_id,
                &format!("f{i}.bin"),
                TransferStatus::Wait,
            ))
            .await
            .unwrap();
    }

    let report = rig
        .service
        .remove_destination(&admin(), "DEST1", true, true)
        .await
        .unwrap();
    assert_eq!(report.cleanup.submitted, 60);
    assert_eq!(report.cleanup.succeeded, 60);
    assert!(rig.memory.list_destination_transfers("DEST1").await.unwrap().is_empty());
    assert!(rig.memory.all_transfers().await.is_empty());
    assert!(rig.memory.get_data_file(file_id).await.unwrap().is_none());
}

#[tokio::test]
async fn host_deactivation_is_visible_immediately() {
    let rig = rig();
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    let before = rig.store.destination_snapshot("DEST1").await.unwrap().unwrap();
    assert!(before.host("dest1-host").unwrap().active);

    rig.service
        .set_host_active(&admin(), "dest1-host", false)
        .await
        .unwrap();

    let after = rig.store.destination_snapshot("DEST1").await.unwrap().unwrap();
    assert!(!after.host("dest1-host").unwrap().active);
}

#[tokio::test]
async fn inactive_monitoring_is_never_woken() {
    let rig = rig();
    rig.monitoring.set_activated(false);
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    rig.service.hold(&admin(), "DEST1", true).await.unwrap();
    assert_eq!(rig.monitoring.wakeups(), 0);
}

#[tokio::test]
async fn failing_hook_does_not_fail_the_operation() {
    let rig = rig();
    rig.monitoring.set_failing(true);
    seed_destination(rig.memory.as_ref(), "DEST1", "a.bin", TransferStatus::Wait)
        .await
        .unwrap();
    rig.service.hold(&admin(), "DEST1", true).await.unwrap();
    assert_eq!(rig.monitoring.wakeups(), 1);
}
