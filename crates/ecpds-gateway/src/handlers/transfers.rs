// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data transfer administration.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ecpds_core::{TransferId, TransferStatus};
use ecpds_master::TransitionKind;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TransferStatus,
    /// `progress` or `override`; administrators override by default.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_commit")]
    pub commit: bool,
}

fn default_commit() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StatusAllowedQuery {
    pub status: TransferStatus,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct ExpiryRequest {
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct AllowedResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct InterruptResponse {
    pub interrupted: bool,
}

fn parse_kind(kind: Option<&str>) -> Result<TransitionKind, ApiError> {
    match kind {
        None => Ok(TransitionKind::Override),
        Some(raw) => TransitionKind::from_str(raw)
            .map_err(|_| ApiError::BadRequest(format!("unknown transition kind {raw:?}"))),
    }
}

/// PUT /v1/transfers/{id}/status
pub async fn update_status(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<ChangedResponse>, ApiError> {
    let kind = parse_kind(body.kind.as_deref())?;
    let changed = state
        .master
        .update_transfer_status(&actor, TransferId(id), body.status, kind, body.commit)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// GET /v1/transfers/{id}/status-allowed?status=&kind=
pub async fn status_allowed(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
    Query(query): Query<StatusAllowedQuery>,
) -> Result<Json<AllowedResponse>, ApiError> {
    let kind = parse_kind(query.kind.as_deref())?;
    let allowed = state
        .master
        .transfer_status_update_allowed(TransferId(id), query.status, kind)
        .await?;
    Ok(Json(AllowedResponse { allowed }))
}

/// PUT /v1/transfers/{id}/priority
pub async fn update_priority(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
    Json(body): Json<PriorityRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .master
        .update_priority(&actor, TransferId(id), body.priority)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/transfers/{id}/expiry
pub async fn update_expiry(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
    Json(body): Json<ExpiryRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .master
        .update_expiry(&actor, TransferId(id), body.expiry)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/transfers/{id}/interrupt
pub async fn interrupt(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
) -> Result<Json<InterruptResponse>, ApiError> {
    let interrupted = state.master.interrupt(&actor, TransferId(id)).await?;
    Ok(Json(InterruptResponse { interrupted }))
}

/// POST /v1/transfers/{id}/reschedule
pub async fn reschedule(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .master
        .reset_transfer_schedule_date(&actor, TransferId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/transfers/{id}/clean
pub async fn clean(
    State(state): State<GatewayState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.master.clean_data_transfer(&actor, TransferId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
