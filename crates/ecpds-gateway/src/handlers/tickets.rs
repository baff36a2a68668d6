// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mover-side ticket redemption, completion and the raw ticket check.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ecpds_core::{Direction, TicketId};
use ecpds_ticket::{Completion, Ticket, TicketTarget};

use crate::error::ApiError;
use crate::server::GatewayState;

/// What a redeemed ticket authorizes.
#[derive(Debug, Serialize)]
pub struct TicketView {
    pub id: TicketId,
    pub target: TicketTarget,
    pub direction: Direction,
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umask: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            target: ticket.target,
            direction: ticket.direction,
            offset: ticket.offset,
            length: ticket.length,
            umask: ticket.umask,
            created_at: ticket.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// POST /v1/tickets/{id}/redeem
pub async fn redeem(
    State(state): State<GatewayState>,
    Path(id): Path<u64>,
) -> Result<Json<TicketView>, ApiError> {
    let ticket = state.tickets.redeem(TicketId(id))?;
    Ok(Json(ticket.into()))
}

/// POST /v1/tickets/{id}/complete
pub async fn complete(
    State(state): State<GatewayState>,
    Path(id): Path<u64>,
    Json(completion): Json<Completion>,
) -> Result<StatusCode, ApiError> {
    state.tickets.complete(TicketId(id), completion)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/tickets/{id}/check
pub async fn check(
    State(state): State<GatewayState>,
    Path(id): Path<u64>,
    Json(body): Json<CheckRequest>,
) -> Result<Json<Completion>, ApiError> {
    let timeout = body.timeout_secs.map(Duration::from_secs);
    let checked = state.tickets.check(TicketId(id), timeout).await?;
    Ok(Json(checked.completion))
}
