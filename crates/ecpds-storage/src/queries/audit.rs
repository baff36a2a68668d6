// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail.

use rusqlite::params;

use ecpds_core::EcpdsError;
use ecpds_core::types::{AuditOutcome, AuditRecord};

use crate::database::{Database, map_tr_err};
use crate::rows::{get_time, time_text};

pub async fn insert_audit(db: &Database, record: &AuditRecord) -> Result<(), EcpdsError> {
    let r = record.clone();
    let (succeeded, reason) = match &r.outcome {
        AuditOutcome::Success => (true, None),
        AuditOutcome::Failure(reason) => (false, Some(reason.clone())),
    };
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (actor, operation, target, succeeded, reason, time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    r.actor,
                    r.operation,
                    r.target,
                    succeeded,
                    reason,
                    time_text(&r.time),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent records first, optionally restricted to one target.
pub async fn list_audit(
    db: &Database,
    target: Option<&str>,
    limit: usize,
) -> Result<Vec<AuditRecord>, EcpdsError> {
    let target = target.map(|t| t.to_string());
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT actor, operation, target, succeeded, reason, time FROM audit_log
                 WHERE ?1 IS NULL OR target = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![target, limit], |row| {
                let succeeded: bool = row.get(3)?;
                let reason: Option<String> = row.get(4)?;
                Ok(AuditRecord {
                    actor: row.get(0)?,
                    operation: row.get(1)?,
                    target: row.get(2)?,
                    outcome: if succeeded {
                        AuditOutcome::Success
                    } else {
                        AuditOutcome::Failure(reason.unwrap_or_default())
                    },
                    time: get_time(row, 5)?,
                })
            })?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}
