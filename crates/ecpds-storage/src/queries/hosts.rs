// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hosts, destination associations, transfer servers and countries.

use rusqlite::{OptionalExtension, Row, params};

use ecpds_core::EcpdsError;
use ecpds_core::types::{Association, Country, Host, TransferServer};

use crate::database::{Database, map_tr_err};
use crate::rows::get_enum;

const HOST_COLUMNS: &str = "name, active, kind, transfer_group, address, login, directory";
const SERVER_COLUMNS: &str = "name, transfer_group, address, port, active";

fn host_row(row: &Row<'_>) -> rusqlite::Result<Host> {
    Ok(Host {
        name: row.get(0)?,
        active: row.get(1)?,
        kind: get_enum(row, 2)?,
        transfer_group: row.get(3)?,
        address: row.get(4)?,
        login: row.get(5)?,
        directory: row.get(6)?,
    })
}

fn server_row(row: &Row<'_>) -> rusqlite::Result<TransferServer> {
    Ok(TransferServer {
        name: row.get(0)?,
        transfer_group: row.get(1)?,
        address: row.get(2)?,
        port: row.get(3)?,
        active: row.get(4)?,
    })
}

pub async fn get_host(db: &Database, name: &str) -> Result<Option<Host>, EcpdsError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {HOST_COLUMNS} FROM hosts WHERE name = ?1"),
                params![name],
                host_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_hosts(db: &Database) -> Result<Vec<Host>, EcpdsError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {HOST_COLUMNS} FROM hosts ORDER BY name"))?;
            let rows = stmt.query_map([], host_row)?;
            let mut hosts = Vec::new();
            for row in rows {
                hosts.push(row?);
            }
            Ok(hosts)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_host(db: &Database, host: &Host) -> Result<(), EcpdsError> {
    let h = host.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO hosts ({HOST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(name) DO NOTHING"
                ),
                params![
                    h.name,
                    h.active,
                    h.kind.to_string(),
                    h.transfer_group,
                    h.address,
                    h.login,
                    h.directory,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)?;
    if !inserted {
        return Err(EcpdsError::AlreadyExists(format!("host {}", host.name)));
    }
    Ok(())
}

pub async fn update_host(db: &Database, host: &Host) -> Result<(), EcpdsError> {
    let h = host.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE hosts SET active = ?2, kind = ?3, transfer_group = ?4, address = ?5,
                     login = ?6, directory = ?7
                 WHERE name = ?1",
                params![
                    h.name,
                    h.active,
                    h.kind.to_string(),
                    h.transfer_group,
                    h.address,
                    h.login,
                    h.directory,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(EcpdsError::NotFound(format!("host {}", host.name)));
    }
    Ok(())
}

/// Delete a host and every association pointing at it.
pub async fn remove_host(db: &Database, name: &str) -> Result<bool, EcpdsError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM hosts WHERE name = ?1", params![name])?;
            tx.execute("DELETE FROM associations WHERE host = ?1", params![name])?;
            tx.commit()?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_association(db: &Database, association: &Association) -> Result<(), EcpdsError> {
    let a = association.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO associations (destination, host, priority) VALUES (?1, ?2, ?3)
                 ON CONFLICT(destination, host) DO NOTHING",
                params![a.destination, a.host, a.priority],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)?;
    if !inserted {
        return Err(EcpdsError::AlreadyExists(format!(
            "association {}/{}",
            association.destination, association.host
        )));
    }
    Ok(())
}

pub async fn remove_association(db: &Database, destination: &str, host: &str) -> Result<bool, EcpdsError> {
    let destination = destination.to_string();
    let host = host.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM associations WHERE destination = ?1 AND host = ?2",
                params![destination, host],
            )?;
            Ok(removed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Associations of a destination, highest priority (lowest value) first.
pub async fn list_associations(db: &Database, destination: &str) -> Result<Vec<Association>, EcpdsError> {
    let destination = destination.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT destination, host, priority FROM associations
                 WHERE destination = ?1 ORDER BY priority, host",
            )?;
            let rows = stmt.query_map(params![destination], |row| {
                Ok(Association {
                    destination: row.get(0)?,
                    host: row.get(1)?,
                    priority: row.get(2)?,
                })
            })?;
            let mut associations = Vec::new();
            for row in rows {
                associations.push(row?);
            }
            Ok(associations)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_host_destinations(db: &Database, host: &str) -> Result<Vec<String>, EcpdsError> {
    let host = host.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT destination FROM associations WHERE host = ?1 ORDER BY destination",
            )?;
            let rows = stmt.query_map(params![host], |row| row.get(0))?;
            let mut destinations = Vec::new();
            for row in rows {
                destinations.push(row?);
            }
            Ok(destinations)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_transfer_server(db: &Database, name: &str) -> Result<Option<TransferServer>, EcpdsError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SERVER_COLUMNS} FROM transfer_servers WHERE name = ?1"),
                params![name],
                server_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_transfer_servers(db: &Database) -> Result<Vec<TransferServer>, EcpdsError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVER_COLUMNS} FROM transfer_servers ORDER BY name"
            ))?;
            let rows = stmt.query_map([], server_row)?;
            let mut servers = Vec::new();
            for row in rows {
                servers.push(row?);
            }
            Ok(servers)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_transfer_server(db: &Database, server: &TransferServer) -> Result<(), EcpdsError> {
    let s = server.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT INTO transfer_servers ({SERVER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(name) DO NOTHING"
                ),
                params![s.name, s.transfer_group, s.address, s.port, s.active],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)?;
    if !inserted {
        return Err(EcpdsError::AlreadyExists(format!(
            "transfer server {}",
            server.name
        )));
    }
    Ok(())
}

pub async fn list_countries(db: &Database) -> Result<Vec<Country>, EcpdsError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT iso, name FROM countries ORDER BY iso")?;
            let rows = stmt.query_map([], |row| {
                Ok(Country {
                    iso: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            let mut countries = Vec::new();
            for row in rows {
                countries.push(row?);
            }
            Ok(countries)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_country(db: &Database, country: &Country) -> Result<(), EcpdsError> {
    let c = country.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO countries (iso, name) VALUES (?1, ?2) ON CONFLICT(iso) DO NOTHING",
                params![c.iso, c.name],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)?;
    if !inserted {
        return Err(EcpdsError::AlreadyExists(format!("country {}", country.iso)));
    }
    Ok(())
}
