// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the ECPDS master control plane.

use std::time::Duration;

use thiserror::Error;

/// The primary error type returned by every control-plane operation.
#[derive(Debug, Error)]
pub enum EcpdsError {
    /// Requested entity or logical path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation unsupported on this domain, or the caller is not authorized.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A status, priority or expiry change would violate the entity invariants.
    /// The store is left untouched when this is returned.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The ticket deadline elapsed before completion was observed.
    #[error("ticket {id} expired")]
    TicketExpired { id: u64 },

    /// The ticket was never issued, already consumed, or reaped.
    #[error("ticket {id} not found")]
    TicketNotFound { id: u64 },

    /// A partial read was requested on a whole-resource domain.
    #[error("range not supported: {0}")]
    RangeNotSupported(String),

    /// Primary-key collision in the persistent store.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Store or network failure that the caller may retry.
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EcpdsError {
    /// Shorthand for a [`EcpdsError::Transient`] without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the caller may safely retry the failed operation.
    ///
    /// The control plane never retries on its own; it only reports.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::Storage { .. } | Self::Timeout { .. }
        )
    }

    /// Short stable label used for metrics and audit outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::TicketExpired { .. } => "ticket_expired",
            Self::TicketNotFound { .. } => "ticket_not_found",
            Self::RangeNotSupported(_) => "range_not_supported",
            Self::AlreadyExists(_) => "already_exists",
            Self::Transient { .. } => "transient",
            Self::Storage { .. } => "storage",
            Self::Config(_) => "config",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
