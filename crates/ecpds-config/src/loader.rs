// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ecpds.toml` > `~/.config/ecpds/ecpds.toml` > `/etc/ecpds/ecpds.toml`
//! with environment variable overrides via `ECPDS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::EcpdsConfig;

/// Top-level sections; an env var `ECPDS_<SECTION>_<KEY>` maps to `<section>.<key>`.
const SECTIONS: &[&str] = &[
    "master", "ticket", "cache", "cleanup", "proxy", "storage", "gateway", "access",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ecpds/ecpds.toml` (system-wide)
/// 3. `~/.config/ecpds/ecpds.toml` (user XDG config)
/// 4. `./ecpds.toml` (local directory)
/// 5. `ECPDS_*` environment variables
pub fn load_config() -> Result<EcpdsConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<EcpdsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EcpdsConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EcpdsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EcpdsConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(EcpdsConfig::default()))
        .merge(Toml::file("/etc/ecpds/ecpds.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("ecpds/ecpds.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("ecpds.toml"))
        .merge(env_provider())
}

/// Environment provider mapping the first underscore after a known section to a dot.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores: `ECPDS_TICKET_CHECK_TIMEOUT_SECS` must become
/// `ticket.check_timeout_secs`, not `ticket.check.timeout.secs`.
fn env_provider() -> Env {
    Env::prefixed("ECPDS_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
