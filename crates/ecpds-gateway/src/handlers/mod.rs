// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers, one module per group of routes.

pub mod destinations;
pub mod health;
pub mod proxy;
pub mod tickets;
pub mod transfers;

use serde::Deserialize;

/// Body of operations that only toggle between a graceful and an immediate run.
#[derive(Debug, Deserialize)]
pub struct GracefulRequest {
    #[serde(default = "default_graceful")]
    pub graceful: bool,
}

fn default_graceful() -> bool {
    true
}
