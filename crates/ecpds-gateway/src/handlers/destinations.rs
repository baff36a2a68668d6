// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination and host administration.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use ecpds_core::DestinationStatus;
use ecpds_master::{BulkOutcome, RemovalReport};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::handlers::GracefulRequest;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub status: DestinationStatus,
    pub display: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveQuery {
    #[serde(default)]
    pub purge_all: bool,
    #[serde(default)]
    pub clean_only: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub cleaned: usize,
    pub cleanup_failures: usize,
    pub removed_hosts: Vec<String>,
    pub detached_hosts: Vec<String>,
    pub removed_permissions: usize,
    pub destination_removed: bool,
}

impl From<RemovalReport> for RemovalResponse {
    fn from(report: RemovalReport) -> Self {
        Self {
            cleaned: report.cleanup.succeeded,
            cleanup_failures: report.cleanup.failed,
            removed_hosts: report.removed_hosts,
            detached_hosts: report.detached_hosts,
            removed_permissions: report.removed_permissions,
            destination_removed: report.destination_removed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkFailure {
    pub destination: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub succeeded: usize,
    pub failed: Vec<BulkFailure>,
}

impl From<BulkOutcome> for BulkResponse {
    fn from(outcome: BulkOutcome) -> Self {
        Self {
            succeeded: outcome.succeeded,
            failed: outcome
                .failed
                .into_iter()
                .map(|(destination, error)| BulkFailure { destination, error })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HostActiveRequest {
    pub active: bool,
}

/// GET /v1/destinations/{name}/status
pub async fn status(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.master.destination_status(&name).await?;
    Ok(Json(StatusResponse {
        name,
        status,
        display: status.display_name(),
    }))
}

/// POST /v1/destinations/{name}/hold
pub async fn hold(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(name): Path<String>,
    Json(body): Json<GracefulRequest>,
) -> Result<StatusCode, ApiError> {
    state.master.hold(&actor, &name, body.graceful).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/destinations/{name}/restart
pub async fn restart(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(name): Path<String>,
    Json(body): Json<GracefulRequest>,
) -> Result<StatusCode, ApiError> {
    state.master.restart(&actor, &name, body.graceful).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/destinations/{name}?purge_all=&clean_only=
pub async fn remove(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(name): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<RemovalResponse>, ApiError> {
    let report = state
        .master
        .remove_destination(&actor, &name, query.purge_all, query.clean_only)
        .await?;
    Ok(Json(report.into()))
}

/// POST /v1/destinations/hold-all
pub async fn hold_all(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Json(body): Json<GracefulRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    let outcome = state.master.hold_all(&actor, body.graceful).await?;
    Ok(Json(outcome.into()))
}

/// POST /v1/destinations/restart-all
pub async fn restart_all(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Json(body): Json<GracefulRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    let outcome = state.master.restart_all(&actor, body.graceful).await?;
    Ok(Json(outcome.into()))
}

/// PUT /v1/hosts/{name}/active
pub async fn set_host_active(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(name): Path<String>,
    Json(body): Json<HostActiveRequest>,
) -> Result<StatusCode, ApiError> {
    state.master.set_host_active(&actor, &name, body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}
