// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination CRUD and the per-destination user tables.

use rusqlite::{OptionalExtension, Row, params};

use ecpds_core::EcpdsError;
use ecpds_core::types::{Destination, SchedulerValue};

use crate::database::{Database, map_tr_err};
use crate::rows::{get_enum, to_sql_u64};

const COLUMNS: &str = "name, active, status, user_status, country_iso, comment, type_label, \
                       ecuser, group_by_date, max_bytes_per_sec, requeue, start_count";

fn destination_row(row: &Row<'_>) -> rusqlite::Result<Destination> {
    let max_bytes_per_sec: Option<i64> = row.get(9)?;
    Ok(Destination {
        name: row.get(0)?,
        active: row.get(1)?,
        status: get_enum(row, 2)?,
        user_status: row.get(3)?,
        country_iso: row.get(4)?,
        comment: row.get(5)?,
        type_label: row.get(6)?,
        ecuser: row.get(7)?,
        group_by_date: row.get(8)?,
        max_bytes_per_sec: max_bytes_per_sec.and_then(|v| u64::try_from(v).ok()),
        scheduler: SchedulerValue {
            requeue: row.get(10)?,
            start_count: row.get(11)?,
        },
    })
}

pub async fn get_destination(db: &Database, name: &str) -> Result<Option<Destination>, EcpdsError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM destinations WHERE name = ?1"),
                params![name],
                destination_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_destinations(db: &Database) -> Result<Vec<Destination>, EcpdsError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM destinations ORDER BY name"))?;
            let rows = stmt.query_map([], destination_row)?;
            let mut destinations = Vec::new();
            for row in rows {
                destinations.push(row?);
            }
            Ok(destinations)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_destination(db: &Database, destination: &Destination) -> Result<(), EcpdsError> {
    let d = destination.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO destinations ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                     ON CONFLICT(name) DO NOTHING"
                ),
                params![
                    d.name,
                    d.active,
                    d.status.to_string(),
                    d.user_status,
                    d.country_iso,
                    d.comment,
                    d.type_label,
                    d.ecuser,
                    d.group_by_date,
                    d.max_bytes_per_sec.map(to_sql_u64),
                    d.scheduler.requeue,
                    d.scheduler.start_count,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)?;
    if inserted {
        Ok(())
    } else {
        Err(EcpdsError::AlreadyExists(format!(
            "destination {}",
            destination.name
        )))
    }
}

pub async fn update_destination(db: &Database, destination: &Destination) -> Result<(), EcpdsError> {
    let d = destination.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE destinations SET active = ?2, status = ?3, user_status = ?4,
                     country_iso = ?5, comment = ?6, type_label = ?7, ecuser = ?8,
                     group_by_date = ?9, max_bytes_per_sec = ?10, requeue = ?11,
                     start_count = ?12
                 WHERE name = ?1",
                params![
                    d.name,
                    d.active,
                    d.status.to_string(),
                    d.user_status,
                    d.country_iso,
                    d.comment,
                    d.type_label,
                    d.ecuser,
                    d.group_by_date,
                    d.max_bytes_per_sec.map(to_sql_u64),
                    d.scheduler.requeue,
                    d.scheduler.start_count,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(EcpdsError::NotFound(format!(
            "destination {}",
            destination.name
        )));
    }
    Ok(())
}

/// Delete a destination together with its transfers, links and user tables.
pub async fn remove_destination(db: &Database, name: &str) -> Result<bool, EcpdsError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM destinations WHERE name = ?1", params![name])?;
            if removed == 0 {
                return Ok(false);
            }
            for table in [
                "data_transfers",
                "associations",
                "destination_aliases",
                "destination_users",
                "incoming_permissions",
            ] {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE destination = ?1"),
                    params![name],
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

async fn list_names(db: &Database, sql: &'static str, destination: &str) -> Result<Vec<String>, EcpdsError> {
    let destination = destination.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params![destination], |row| row.get(0))?;
            let mut names = Vec::new();
            for row in rows {
                names.push(row?);
            }
            Ok(names)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_aliases(db: &Database, destination: &str) -> Result<Vec<String>, EcpdsError> {
    list_names(
        db,
        "SELECT alias FROM destination_aliases WHERE destination = ?1 ORDER BY alias",
        destination,
    )
    .await
}

pub async fn list_destination_users(db: &Database, destination: &str) -> Result<Vec<String>, EcpdsError> {
    list_names(
        db,
        "SELECT user_name FROM destination_users WHERE destination = ?1 ORDER BY user_name",
        destination,
    )
    .await
}

async fn link(db: &Database, sql: &'static str, destination: &str, name: &str) -> Result<(), EcpdsError> {
    let destination = destination.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(sql, params![destination, name])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn add_alias(db: &Database, destination: &str, alias: &str) -> Result<(), EcpdsError> {
    link(
        db,
        "INSERT OR IGNORE INTO destination_aliases (destination, alias) VALUES (?1, ?2)",
        destination,
        alias,
    )
    .await
}

pub async fn add_destination_user(db: &Database, destination: &str, user: &str) -> Result<(), EcpdsError> {
    link(
        db,
        "INSERT OR IGNORE INTO destination_users (destination, user_name) VALUES (?1, ?2)",
        destination,
        user,
    )
    .await
}

/// Allow `user` to push data into `destination`.
pub async fn grant_incoming(db: &Database, destination: &str, user: &str) -> Result<(), EcpdsError> {
    link(
        db,
        "INSERT OR IGNORE INTO incoming_permissions (destination, user_name) VALUES (?1, ?2)",
        destination,
        user,
    )
    .await
}

pub async fn remove_incoming_permissions(db: &Database, destination: &str) -> Result<usize, EcpdsError> {
    let destination = destination.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM incoming_permissions WHERE destination = ?1",
                params![destination],
            )
        })
        .await
        .map_err(map_tr_err)
}
