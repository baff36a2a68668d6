// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus recorder for the gateway's `/metrics` endpoint.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;

use ecpds_core::EcpdsError;

/// Renders the current exposition text.
pub type Render = Arc<dyn Fn() -> String + Send + Sync>;

/// Install the process-wide recorder and describe every master metric.
///
/// Only one recorder can be installed per process; a second call fails.
pub fn install() -> Result<Render, EcpdsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EcpdsError::Internal(format!("failed to install Prometheus recorder: {e}")))?;

    ecpds_master::recording::register_metrics();
    tracing::info!("prometheus metrics recorder installed");

    Ok(Arc::new(move || handle.render()))
}
