// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the ECPDS master control plane.
//!
//! This crate provides the error taxonomy, the domain types (destinations,
//! hosts, data files, transfers, listings) and the contracts of every external
//! collaborator: the persistent store, movers, schedulers, monitoring,
//! authorization and audit.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::EcpdsError;
pub use types::{
    AdapterType, Association, AuditOutcome, AuditRecord, Country, DataFile, DataFileId,
    DataTransfer, Destination, DestinationStatus, Direction, FileListElement, HealthStatus, Host,
    HostKind, MoverEndpoint, Principal, Resource, SchedulerValue, TicketId, TransferHistory,
    TransferId, TransferServer, TransferStatus,
};

pub use traits::{
    AuditSink, Authorizer, DispatchScheduler, MonitoringAdapter, MoverAdapter, MoverRequest,
    PersistentStore, PluginAdapter, RetrievalScheduler, SchedulerKind,
};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ecpds_error_has_all_variants() {
        let errors = [
            EcpdsError::NotFound("x".into()),
            EcpdsError::PermissionDenied("x".into()),
            EcpdsError::InvalidTransition("x".into()),
            EcpdsError::TicketExpired { id: 1 },
            EcpdsError::TicketNotFound { id: 1 },
            EcpdsError::RangeNotSupported("x".into()),
            EcpdsError::AlreadyExists("x".into()),
            EcpdsError::transient("x"),
            EcpdsError::Storage {
                source: Box::new(std::io::Error::other("test")),
            },
            EcpdsError::Config("x".into()),
            EcpdsError::Timeout {
                duration: std::time::Duration::from_secs(30),
            },
            EcpdsError::Internal("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len(), "every variant has its own kind");
    }

    #[test]
    fn only_store_and_network_failures_are_retryable() {
        assert!(EcpdsError::transient("db busy").is_retryable());
        assert!(
            EcpdsError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!EcpdsError::TicketNotFound { id: 7 }.is_retryable());
        assert!(!EcpdsError::InvalidTransition("x".into()).is_retryable());
    }

    #[test]
    fn ticket_errors_name_the_ticket() {
        assert_eq!(
            EcpdsError::TicketExpired { id: 42 }.to_string(),
            "ticket 42 expired"
        );
        assert_eq!(
            EcpdsError::TicketNotFound { id: 42 }.to_string(),
            "ticket 42 not found"
        );
    }

    #[test]
    fn transfer_status_codes_round_trip() {
        for status in TransferStatus::ALL {
            let code = status.to_string();
            assert_eq!(code.len(), 4);
            assert_eq!(TransferStatus::from_str(&code).unwrap(), status);
            assert_eq!(
                TransferStatus::from_str(&code.to_lowercase()).unwrap(),
                status
            );
        }
    }

    #[test]
    fn status_display_names() {
        assert_eq!(TransferStatus::Hold.display_name(), "StandBy");
        assert_eq!(TransferStatus::Retr.display_name(), "ReQueued");
        assert_eq!(DestinationStatus::Fail.display_name(), "NoHosts");
        assert_eq!(DestinationStatus::Hold.display_name(), "Failed");
        assert_eq!(DestinationStatus::Wait.display_name(), "Idle");
        assert_eq!(DestinationStatus::from_str("RSTR").unwrap(), DestinationStatus::Rstr);
    }

    #[test]
    fn status_serializes_as_code() {
        let json = serde_json::to_string(&TransferStatus::Exec).unwrap();
        assert_eq!(json, "\"EXEC\"");
        let parsed: DestinationStatus = serde_json::from_str("\"STOP\"").unwrap();
        assert_eq!(parsed, DestinationStatus::Stop);
    }

    #[test]
    fn new_destination_starts_in_init() {
        let dest = Destination::new("DEST1", "fr");
        assert_eq!(dest.status, DestinationStatus::Init);
        assert_eq!(dest.scheduler, SchedulerValue::default());
        assert!(dest.active);
    }

    #[test]
    fn directory_listing_element() {
        let dir = FileListElement::directory("DEST1", "ecpds", "fr", None);
        assert!(dir.is_directory());
        assert_eq!(dir.size, types::DIRECTORY_SIZE);
        let line = dir.to_ftp_line();
        assert!(line.starts_with("drwxr-x---"));
        assert!(line.ends_with("DEST1"));
    }

    #[test]
    fn file_listing_line_contains_all_columns() {
        let file = FileListElement {
            name: "foo.bin".into(),
            permission: types::FILE_PERMISSION.into(),
            owner: "alice".into(),
            group: "fr".into(),
            size: 1234,
            mtime: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            comment: Some("17".into()),
        };
        let line = file.to_ftp_line();
        assert!(!file.is_directory());
        for part in ["-rw-r--r--", "alice", "fr", "1234", "Mar 01 12:30", "foo.bin"] {
            assert!(line.contains(part), "{line} is missing {part}");
        }
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _store(_: &dyn PersistentStore) {}
        fn _mover(_: &dyn MoverAdapter) {}
        fn _retrieval(_: &dyn RetrievalScheduler) {}
        fn _dispatch(_: &dyn DispatchScheduler) {}
        fn _monitoring(_: &dyn MonitoringAdapter) {}
        fn _authorizer(_: &dyn Authorizer) {}
        fn _audit(_: &dyn AuditSink) {}
    }

    proptest! {
        #[test]
        fn bad_and_pending_are_disjoint(idx in 0usize..11) {
            let status = TransferStatus::ALL[idx];
            prop_assert!(!(status.is_bad() && status.is_pending()));
        }
    }
}
