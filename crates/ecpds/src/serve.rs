// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ecpds serve` wiring.
//!
//! Opens the SQLite store, layers the cache over it, builds the state
//! machine, ticket repository and proxy, then runs the gateway until a
//! shutdown signal arrives.

use std::sync::Arc;

use tracing::{info, warn};

use ecpds_cache::{CacheSettings, CachedStore};
use ecpds_config::EcpdsConfig;
use ecpds_core::{EcpdsError, PersistentStore, PluginAdapter, SchedulerKind};
use ecpds_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig};
use ecpds_master::detached::{
    ConfigAuthorizer, DetachedDispatch, DetachedMover, DetachedScheduler, InactiveMonitoring,
};
use ecpds_master::{Collaborators, ManagementService, MasterSettings};
use ecpds_proxy::{ProxyProvider, ProxySettings};
use ecpds_storage::SqliteStore;
use ecpds_ticket::{TicketRepository, TicketSettings};

use crate::{prometheus, shutdown};

/// Run the master until SIGINT or SIGTERM.
pub async fn run_serve(config: EcpdsConfig) -> Result<(), EcpdsError> {
    init_tracing(&config.master.log_level);
    info!(name = %config.master.name, "starting ecpds master");

    let prometheus_render = match prometheus::install() {
        Ok(render) => Some(render),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };

    let sqlite = Arc::new(SqliteStore::new(config.storage.clone()));
    sqlite.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");

    let persistent: Arc<dyn PersistentStore> = sqlite.clone();
    let store = Arc::new(CachedStore::new(
        persistent,
        CacheSettings::from(&config.cache),
    ));

    let master = Arc::new(ManagementService::new(
        Collaborators {
            store,
            dispatch: Arc::new(DetachedDispatch),
            ordinary: Arc::new(DetachedScheduler::new(SchedulerKind::Ordinary)),
            acquisition: Arc::new(DetachedScheduler::new(SchedulerKind::Acquisition)),
            monitoring: Arc::new(InactiveMonitoring),
            audit: sqlite.clone(),
        },
        MasterSettings::from(&config),
    ));

    let tickets = Arc::new(TicketRepository::new(TicketSettings::from(&config.ticket)));
    let proxy = Arc::new(ProxyProvider::new(
        Arc::clone(&tickets),
        Arc::clone(&master),
        Arc::new(DetachedMover),
        Arc::new(ConfigAuthorizer::new(&config.access)),
        ProxySettings::from(&config),
    ));

    let cancel = shutdown::install_signal_handler();
    let reaper = tickets.spawn_reaper(config.ticket.reap_interval(), cancel.clone());

    let gateway = if config.gateway.enabled {
        if config.gateway.bearer_token.is_none() {
            warn!("gateway.bearer_token is not set -- every /v1 request will be rejected");
        }
        let state = GatewayState {
            tickets: Arc::clone(&tickets),
            master: Arc::clone(&master),
            proxy,
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
        };
        let server = ServerConfig::from(&config.gateway);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = ecpds_gateway::start_server(&server, state, cancel.clone()).await {
                tracing::error!(error = %e, "gateway failed");
                cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled by configuration");
        None
    };

    info!("ecpds master ready");
    cancel.cancelled().await;
    info!("shutting down");

    if let Some(gateway) = gateway {
        if let Err(e) = gateway.await {
            warn!(error = %e, "gateway task ended abnormally");
        }
    }
    if let Err(e) = reaper.await {
        warn!(error = %e, "ticket reaper ended abnormally");
    }

    sqlite.shutdown().await?;
    info!("ecpds master stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ecpds={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
