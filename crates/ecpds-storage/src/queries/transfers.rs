// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data files, data transfers and transfer history.

use rusqlite::{OptionalExtension, Row, params};

use ecpds_core::EcpdsError;
use ecpds_core::types::{DataFile, DataFileId, DataTransfer, TransferHistory, TransferId};

use crate::database::{Database, map_tr_err};
use crate::rows::{get_enum, get_opt_time, get_time, get_u64, time_text, to_sql_u64};

const FILE_COLUMNS: &str = "id, original, size, downloaded, deleted, arrived_time, mover";
const TRANSFER_COLUMNS: &str = "id, destination, data_file_id, target, status, priority, asap, \
                                scheduled_time, queue_time, retry_time, expiry_time, \
                                failed_time, finish_time, deleted, comment, size";

fn data_file_row(row: &Row<'_>) -> rusqlite::Result<DataFile> {
    Ok(DataFile {
        id: DataFileId(row.get(0)?),
        original: row.get(1)?,
        size: get_u64(row, 2)?,
        downloaded: row.get(3)?,
        deleted: row.get(4)?,
        arrived_time: get_time(row, 5)?,
        mover: row.get(6)?,
    })
}

fn transfer_row(row: &Row<'_>) -> rusqlite::Result<DataTransfer> {
    Ok(DataTransfer {
        id: TransferId(row.get(0)?),
        destination: row.get(1)?,
        data_file_id: DataFileId(row.get(2)?),
        target: row.get(3)?,
        status: get_enum(row, 4)?,
        priority: row.get(5)?,
        asap: row.get(6)?,
        scheduled_time: get_time(row, 7)?,
        queue_time: get_time(row, 8)?,
        retry_time: get_opt_time(row, 9)?,
        expiry_time: get_time(row, 10)?,
        failed_time: get_opt_time(row, 11)?,
        finish_time: get_opt_time(row, 12)?,
        deleted: row.get(13)?,
        comment: row.get(14)?,
        size: get_u64(row, 15)?,
    })
}

pub async fn get_data_file(db: &Database, id: DataFileId) -> Result<Option<DataFile>, EcpdsError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {FILE_COLUMNS} FROM data_files WHERE id = ?1"),
                params![id.0],
                data_file_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a data file; the id carried by `data_file` is ignored.
pub async fn insert_data_file(db: &Database, data_file: &DataFile) -> Result<DataFileId, EcpdsError> {
    let f = data_file.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO data_files (original, size, downloaded, deleted, arrived_time, mover)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    f.original,
                    to_sql_u64(f.size),
                    f.downloaded,
                    f.deleted,
                    time_text(&f.arrived_time),
                    f.mover,
                ],
            )?;
            Ok(DataFileId(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove_data_file(db: &Database, id: DataFileId) -> Result<bool, EcpdsError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM data_files WHERE id = ?1", params![id.0])?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_data_transfer(db: &Database, id: TransferId) -> Result<Option<DataTransfer>, EcpdsError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {TRANSFER_COLUMNS} FROM data_transfers WHERE id = ?1"),
                params![id.0],
                transfer_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a transfer; the id carried by `transfer` is ignored.
pub async fn insert_data_transfer(db: &Database, transfer: &DataTransfer) -> Result<TransferId, EcpdsError> {
    let t = transfer.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO data_transfers (destination, data_file_id, target, status, priority,
                     asap, scheduled_time, queue_time, retry_time, expiry_time, failed_time,
                     finish_time, deleted, comment, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    t.destination,
                    t.data_file_id.0,
                    t.target,
                    t.status.to_string(),
                    t.priority,
                    t.asap,
                    time_text(&t.scheduled_time),
                    time_text(&t.queue_time),
                    t.retry_time.as_ref().map(time_text),
                    time_text(&t.expiry_time),
                    t.failed_time.as_ref().map(time_text),
                    t.finish_time.as_ref().map(time_text),
                    t.deleted,
                    t.comment,
                    to_sql_u64(t.size),
                ],
            )?;
            Ok(TransferId(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_data_transfer(db: &Database, transfer: &DataTransfer) -> Result<(), EcpdsError> {
    let t = transfer.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE data_transfers SET destination = ?2, data_file_id = ?3, target = ?4,
                     status = ?5, priority = ?6, asap = ?7, scheduled_time = ?8,
                     queue_time = ?9, retry_time = ?10, expiry_time = ?11, failed_time = ?12,
                     finish_time = ?13, deleted = ?14, comment = ?15, size = ?16
                 WHERE id = ?1",
                params![
                    t.id.0,
                    t.destination,
                    t.data_file_id.0,
                    t.target,
                    t.status.to_string(),
                    t.priority,
                    t.asap,
                    time_text(&t.scheduled_time),
                    time_text(&t.queue_time),
                    t.retry_time.as_ref().map(time_text),
                    time_text(&t.expiry_time),
                    t.failed_time.as_ref().map(time_text),
                    t.finish_time.as_ref().map(time_text),
                    t.deleted,
                    t.comment,
                    to_sql_u64(t.size),
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(EcpdsError::NotFound(format!("transfer {}", transfer.id)));
    }
    Ok(())
}

pub async fn remove_data_transfer(db: &Database, id: TransferId) -> Result<bool, EcpdsError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM data_transfers WHERE id = ?1", params![id.0])?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Live (not deleted) transfers of a destination, oldest first.
pub async fn list_destination_transfers(
    db: &Database,
    destination: &str,
) -> Result<Vec<DataTransfer>, EcpdsError> {
    let destination = destination.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TRANSFER_COLUMNS} FROM data_transfers
                 WHERE destination = ?1 AND deleted = 0 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![destination], transfer_row)?;
            let mut transfers = Vec::new();
            for row in rows {
                transfers.push(row?);
            }
            Ok(transfers)
        })
        .await
        .map_err(map_tr_err)
}

/// Live transfers sharing one data file.
pub async fn list_data_file_transfers(
    db: &Database,
    data_file_id: DataFileId,
) -> Result<Vec<DataTransfer>, EcpdsError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TRANSFER_COLUMNS} FROM data_transfers
                 WHERE data_file_id = ?1 AND deleted = 0 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![data_file_id.0], transfer_row)?;
            let mut transfers = Vec::new();
            for row in rows {
                transfers.push(row?);
            }
            Ok(transfers)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_transfer_history(db: &Database, history: &TransferHistory) -> Result<(), EcpdsError> {
    let h = history.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO transfer_history (transfer_id, destination, status, comment, actor, time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    h.transfer_id.0,
                    h.destination,
                    h.status.to_string(),
                    h.comment,
                    h.actor,
                    time_text(&h.time),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// History of a transfer in insertion order.
pub async fn list_transfer_history(
    db: &Database,
    transfer_id: TransferId,
) -> Result<Vec<TransferHistory>, EcpdsError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT transfer_id, destination, status, comment, actor, time
                 FROM transfer_history WHERE transfer_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![transfer_id.0], |row| {
                Ok(TransferHistory {
                    transfer_id: TransferId(row.get(0)?),
                    destination: row.get(1)?,
                    status: get_enum(row, 2)?,
                    comment: row.get(3)?,
                    actor: row.get(4)?,
                    time: get_time(row, 5)?,
                })
            })?;
            let mut history = Vec::new();
            for row in rows {
                history.push(row?);
            }
            Ok(history)
        })
        .await
        .map_err(map_tr_err)
}
