// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of control-plane errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use ecpds_core::EcpdsError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable error kind, e.g. `ticket_expired`.
    pub kind: String,
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Ecpds(EcpdsError),
    /// The request itself is malformed (unknown status code, bad kind).
    BadRequest(String),
}

impl From<EcpdsError> for ApiError {
    fn from(e: EcpdsError) -> Self {
        Self::Ecpds(e)
    }
}

/// HTTP status for an error kind.
pub fn status_for(error: &EcpdsError) -> StatusCode {
    match error {
        EcpdsError::NotFound(_) | EcpdsError::TicketNotFound { .. } => StatusCode::NOT_FOUND,
        EcpdsError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        EcpdsError::InvalidTransition(_) | EcpdsError::AlreadyExists(_) => StatusCode::CONFLICT,
        EcpdsError::TicketExpired { .. } => StatusCode::GONE,
        EcpdsError::RangeNotSupported(_) => StatusCode::RANGE_NOT_SATISFIABLE,
        EcpdsError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EcpdsError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        EcpdsError::Storage { .. } | EcpdsError::Config(_) | EcpdsError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Ecpds(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    tracing::warn!(error = %e, "request failed");
                }
                (status, e.kind().to_string(), e.to_string())
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request".to_string(), message),
        };
        (
            status,
            Json(ErrorResponse {
                kind,
                error: message,
            }),
        )
            .into_response()
    }
}
