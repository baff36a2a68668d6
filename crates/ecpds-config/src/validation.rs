// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express and reports every
//! violation at once.

use crate::diagnostic::ConfigError;
use crate::model::EcpdsConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Returns all collected errors rather than stopping at the first one.
pub fn validate_config(config: &EcpdsConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.master.name.trim().is_empty() {
        errors.push(ConfigError::validation("master.name", "must not be empty"));
    }
    if !LOG_LEVELS.contains(&config.master.log_level.as_str()) {
        errors.push(ConfigError::validation(
            "master.log_level",
            format!(
                "`{}` is not one of {}",
                config.master.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    let ticket = &config.ticket;
    for (key, value) in [
        ("ticket.check_timeout_secs", ticket.check_timeout_secs),
        ("ticket.ticket_timeout_secs", ticket.ticket_timeout_secs),
        (
            "ticket.timeout_after_completion_secs",
            ticket.timeout_after_completion_secs,
        ),
        ("ticket.reap_interval_secs", ticket.reap_interval_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(key, "must be greater than zero"));
        }
    }
    if ticket.check_timeout_secs > ticket.ticket_timeout_secs {
        errors.push(ConfigError::validation(
            "ticket.check_timeout_secs",
            format!(
                "{} exceeds ticket.ticket_timeout_secs ({})",
                ticket.check_timeout_secs, ticket.ticket_timeout_secs
            ),
        ));
    }

    for (key, value) in [
        ("cache.destination_ttl_ms", config.cache.destination_ttl_ms),
        ("cache.monitoring_ttl_ms", config.cache.monitoring_ttl_ms),
        ("cache.transfer_ttl_ms", config.cache.transfer_ttl_ms),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(key, "must be greater than zero"));
        }
    }

    if config.cleanup.concurrency == 0 {
        errors.push(ConfigError::validation(
            "cleanup.concurrency",
            "must be at least 1",
        ));
    }

    if config.proxy.attachments_dir.trim().is_empty() {
        errors.push(ConfigError::validation(
            "proxy.attachments_dir",
            "must not be empty",
        ));
    }
    check_address(&mut errors, "proxy.public_address", &config.proxy.public_address);

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.gateway.enabled {
        check_address(&mut errors, "gateway.host", &config.gateway.host);
        if config.gateway.port == 0 {
            errors.push(ConfigError::validation("gateway.port", "must not be 0"));
        }
    }
    if let Some(token) = &config.gateway.bearer_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "gateway.bearer_token",
            "must not be blank when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Accept an IP address or something shaped like a hostname.
fn check_address(errors: &mut Vec<ConfigError>, key: &str, value: &str) {
    let addr = value.trim();
    if addr.is_empty() {
        errors.push(ConfigError::validation(key, "must not be empty"));
        return;
    }
    let is_ip = addr.parse::<std::net::IpAddr>().is_ok();
    let is_hostname = addr
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !is_ip && !is_hostname {
        errors.push(ConfigError::validation(
            key,
            format!("`{addr}` is not a valid IP address or hostname"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&EcpdsConfig::default()).is_ok());
    }

    #[test]
    fn zero_ttls_are_rejected() {
        let mut config = EcpdsConfig::default();
        config.cache.transfer_ttl_ms = 0;
        config.cache.destination_ttl_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            keys(&errors),
            vec!["cache.destination_ttl_ms", "cache.transfer_ttl_ms"]
        );
    }

    #[test]
    fn check_timeout_cannot_exceed_ticket_lifetime() {
        let mut config = EcpdsConfig::default();
        config.ticket.check_timeout_secs = 100;
        config.ticket.ticket_timeout_secs = 10;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["ticket.check_timeout_secs"]);
    }

    #[test]
    fn collects_every_error() {
        let mut config = EcpdsConfig::default();
        config.cleanup.concurrency = 0;
        config.master.log_level = "loud".into();
        config.proxy.public_address = "not an address!".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn disabled_gateway_skips_address_checks() {
        let mut config = EcpdsConfig::default();
        config.gateway.enabled = false;
        config.gateway.host = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
