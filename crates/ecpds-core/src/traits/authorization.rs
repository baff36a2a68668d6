// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization service consulted at every path-resolution step.

use async_trait::async_trait;

use crate::error::EcpdsError;
use crate::types::{Principal, Resource};

#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    async fn is_authorized(
        &self,
        principal: &Principal,
        resource: &Resource,
    ) -> Result<bool, EcpdsError>;
}
