// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the ECPDS master.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level master configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EcpdsConfig {
    /// Master identity and logging.
    #[serde(default)]
    pub master: MasterConfig,

    /// Ticket repository timeouts.
    #[serde(default)]
    pub ticket: TicketConfig,

    /// Freshness windows of the read caches.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Bulk transfer cleanup pool.
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Proxy transfer protocol endpoints and attachment store.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote-callable HTTP gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Built-in access policy used when no external authorization service is wired.
    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MasterConfig {
    /// Name of this master, used as the actor of internally triggered operations.
    #[serde(default = "default_master_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            name: default_master_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_master_name() -> String {
    "ecpds-master".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Ticket repository configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TicketConfig {
    /// Default bound of a `check` wait, in seconds.
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,

    /// Lifetime of a ticket that is never completed, in seconds.
    #[serde(default = "default_ticket_timeout_secs")]
    pub ticket_timeout_secs: u64,

    /// How long a completed but unchecked ticket is kept, in seconds.
    #[serde(default = "default_timeout_after_completion_secs")]
    pub timeout_after_completion_secs: u64,

    /// Period of the expiry reaper, in seconds.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl TicketConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn ticket_timeout(&self) -> Duration {
        Duration::from_secs(self.ticket_timeout_secs)
    }

    pub fn timeout_after_completion(&self) -> Duration {
        Duration::from_secs(self.timeout_after_completion_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            check_timeout_secs: default_check_timeout_secs(),
            ticket_timeout_secs: default_ticket_timeout_secs(),
            timeout_after_completion_secs: default_timeout_after_completion_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

fn default_check_timeout_secs() -> u64 {
    20 * 60
}

fn default_ticket_timeout_secs() -> u64 {
    5 * 60 * 60
}

fn default_timeout_after_completion_secs() -> u64 {
    3 * 60
}

fn default_reap_interval_secs() -> u64 {
    60
}

/// Cache freshness windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_destination_ttl_ms")]
    pub destination_ttl_ms: u64,

    #[serde(default = "default_monitoring_ttl_ms")]
    pub monitoring_ttl_ms: u64,

    #[serde(default = "default_transfer_ttl_ms")]
    pub transfer_ttl_ms: u64,
}

impl CacheConfig {
    pub fn destination_ttl(&self) -> Duration {
        Duration::from_millis(self.destination_ttl_ms)
    }

    pub fn monitoring_ttl(&self) -> Duration {
        Duration::from_millis(self.monitoring_ttl_ms)
    }

    pub fn transfer_ttl(&self) -> Duration {
        Duration::from_millis(self.transfer_ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            destination_ttl_ms: default_destination_ttl_ms(),
            monitoring_ttl_ms: default_monitoring_ttl_ms(),
            transfer_ttl_ms: default_transfer_ttl_ms(),
        }
    }
}

fn default_destination_ttl_ms() -> u64 {
    10_000
}

fn default_monitoring_ttl_ms() -> u64 {
    10_000
}

fn default_transfer_ttl_ms() -> u64 {
    2_000
}

/// Bounded worker pool used when cleaning a destination's transfers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Maximum number of transfers cleaned concurrently.
    #[serde(default = "default_cleanup_concurrency")]
    pub concurrency: usize,

    /// Number of submitted items allowed to wait for a worker.
    #[serde(default = "default_cleanup_queue")]
    pub queue: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            concurrency: default_cleanup_concurrency(),
            queue: default_cleanup_queue(),
        }
    }
}

fn default_cleanup_concurrency() -> usize {
    100
}

fn default_cleanup_queue() -> usize {
    50
}

/// Proxy transfer protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Root of the filesystem-backed attachment store.
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: String,

    /// Address clients connect to for bytes served by the master itself.
    #[serde(default = "default_public_address")]
    pub public_address: String,

    #[serde(default = "default_public_port")]
    pub public_port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            attachments_dir: default_attachments_dir(),
            public_address: default_public_address(),
            public_port: default_public_port(),
        }
    }
}

fn default_attachments_dir() -> String {
    "/tmp/ecpds-attachments".to_string()
}

fn default_public_address() -> String {
    "127.0.0.1".to_string()
}

fn default_public_port() -> u16 {
    4640
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode for concurrent reads.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("ecpds").join("ecpds.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("ecpds.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. Without one, `/v1` rejects every request.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    4650
}

/// Built-in access policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Allow principals not otherwise listed.
    #[serde(default = "default_allow")]
    pub default_allow: bool,

    /// Destinations nobody but admins may browse.
    #[serde(default)]
    pub denied_destinations: Vec<String>,

    /// Principals allowed everything.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_allow: default_allow(),
            denied_destinations: Vec::new(),
            admins: Vec::new(),
        }
    }
}

fn default_allow() -> bool {
    true
}
