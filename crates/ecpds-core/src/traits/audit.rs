// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink for administrative audit records.

use async_trait::async_trait;

use crate::error::EcpdsError;
use crate::types::AuditRecord;

#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn record(&self, record: &AuditRecord) -> Result<(), EcpdsError>;
}
