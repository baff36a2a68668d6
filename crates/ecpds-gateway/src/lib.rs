// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the ECPDS master.
//!
//! Every remote-callable operation of the ticket repository, the proxy
//! provider and the management service is exposed as a JSON endpoint under
//! `/v1`, guarded by bearer authentication. `/health` and `/metrics` stay
//! public for health checks and Prometheus scraping.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{AuthConfig, Caller};
pub use error::ApiError;
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
