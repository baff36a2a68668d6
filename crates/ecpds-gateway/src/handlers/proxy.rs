// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proxy transfer protocol over HTTP.

use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ecpds_core::FileListElement;
use ecpds_ticket::{Completion, ProxySocket};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub path: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub length: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct OutputRequest {
    pub path: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub umask: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyCheckRequest {
    pub socket: ProxySocket,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct SizeResponse {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct ModifiedResponse {
    pub path: String,
    pub modified: DateTime<Utc>,
}

/// POST /v1/proxy/input
pub async fn input(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<InputRequest>,
) -> Result<Json<ProxySocket>, ApiError> {
    let socket = state
        .proxy
        .get_input(&principal, &body.path, body.offset, body.length)
        .await?;
    Ok(Json(socket))
}

/// POST /v1/proxy/output
pub async fn output(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<OutputRequest>,
) -> Result<Json<ProxySocket>, ApiError> {
    let socket = state
        .proxy
        .get_output(&principal, &body.path, body.offset, body.umask)
        .await?;
    Ok(Json(socket))
}

/// POST /v1/proxy/check
pub async fn check(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<ProxyCheckRequest>,
) -> Result<Json<Completion>, ApiError> {
    let timeout = body.timeout_secs.map(Duration::from_secs);
    let completion = state.proxy.check(&principal, &body.socket, timeout).await?;
    Ok(Json(completion))
}

/// POST /v1/proxy/delete
pub async fn delete(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<PathRequest>,
) -> Result<StatusCode, ApiError> {
    state.proxy.delete(&principal, &body.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/proxy/mkdir
pub async fn mkdir(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<PathRequest>,
) -> Result<StatusCode, ApiError> {
    state.proxy.mkdir(&principal, &body.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/proxy/rmdir
pub async fn rmdir(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<PathRequest>,
) -> Result<StatusCode, ApiError> {
    state.proxy.rmdir(&principal, &body.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/proxy/move
pub async fn rename(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Json(body): Json<MoveRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .proxy
        .rename(&principal, &body.source, &body.target)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/proxy/list?path=
pub async fn list(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Query(query): Query<PathRequest>,
) -> Result<Json<Vec<FileListElement>>, ApiError> {
    Ok(Json(state.proxy.list(&principal, &query.path).await?))
}

/// GET /v1/proxy/size?path=
pub async fn size(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Query(query): Query<PathRequest>,
) -> Result<Json<SizeResponse>, ApiError> {
    let size = state.proxy.size(&principal, &query.path).await?;
    Ok(Json(SizeResponse {
        path: query.path,
        size,
    }))
}

/// GET /v1/proxy/modified?path=
pub async fn modified(
    State(state): State<GatewayState>,
    Caller(principal): Caller,
    Query(query): Query<PathRequest>,
) -> Result<Json<ModifiedResponse>, ApiError> {
    let modified = state.proxy.modified(&principal, &query.path).await?;
    Ok(Json(ModifiedResponse {
        path: query.path,
        modified,
    }))
}
