// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use ecpds_config::model::GatewayConfig;
use ecpds_core::EcpdsError;
use ecpds_master::ManagementService;
use ecpds_proxy::ProxyProvider;
use ecpds_ticket::TicketRepository;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers::{destinations, health, proxy, tickets, transfers};

/// State of the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
    /// Renders the Prometheus exposition, when a recorder is installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub tickets: Arc<TicketRepository>,
    pub master: Arc<ManagementService>,
    pub proxy: Arc<ProxyProvider>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Every route of the gateway.
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(health::get_health))
        .route("/metrics", get(health::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/tickets/{id}/redeem", post(tickets::redeem))
        .route("/v1/tickets/{id}/complete", post(tickets::complete))
        .route("/v1/tickets/{id}/check", post(tickets::check))
        .route("/v1/proxy/input", post(proxy::input))
        .route("/v1/proxy/output", post(proxy::output))
        .route("/v1/proxy/check", post(proxy::check))
        .route("/v1/proxy/delete", post(proxy::delete))
        .route("/v1/proxy/mkdir", post(proxy::mkdir))
        .route("/v1/proxy/rmdir", post(proxy::rmdir))
        .route("/v1/proxy/move", post(proxy::rename))
        .route("/v1/proxy/list", get(proxy::list))
        .route("/v1/proxy/size", get(proxy::size))
        .route("/v1/proxy/modified", get(proxy::modified))
        .route("/v1/destinations/hold-all", post(destinations::hold_all))
        .route("/v1/destinations/restart-all", post(destinations::restart_all))
        .route("/v1/destinations/{name}", delete(destinations::remove))
        .route("/v1/destinations/{name}/status", get(destinations::status))
        .route("/v1/destinations/{name}/hold", post(destinations::hold))
        .route("/v1/destinations/{name}/restart", post(destinations::restart))
        .route("/v1/hosts/{name}/active", put(destinations::set_host_active))
        .route("/v1/transfers/{id}/status", put(transfers::update_status))
        .route("/v1/transfers/{id}/status-allowed", get(transfers::status_allowed))
        .route("/v1/transfers/{id}/priority", put(transfers::update_priority))
        .route("/v1/transfers/{id}/expiry", put(transfers::update_expiry))
        .route("/v1/transfers/{id}/interrupt", post(transfers::interrupt))
        .route("/v1/transfers/{id}/reschedule", post(transfers::reschedule))
        .route("/v1/transfers/{id}/clean", post(transfers::clean))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), EcpdsError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EcpdsError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| EcpdsError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
