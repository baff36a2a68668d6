// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the ECPDS configuration system.

use std::path::Path;
use std::time::Duration;

use ecpds_config::diagnostic::ConfigError;
use ecpds_config::model::EcpdsConfig;
use ecpds_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

/// Every section deserializes from a complete file.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[master]
name = "master-1"
log_level = "debug"

[ticket]
check_timeout_secs = 600
ticket_timeout_secs = 3600
timeout_after_completion_secs = 60
reap_interval_secs = 5

[cache]
destination_ttl_ms = 5000
monitoring_ttl_ms = 4000
transfer_ttl_ms = 1000

[cleanup]
concurrency = 8
queue = 4

[proxy]
attachments_dir = "/var/lib/ecpds/attachments"
public_address = "10.0.0.1"
public_port = 9000

[storage]
database_path = "/tmp/ecpds-test.db"
wal_mode = false

[gateway]
enabled = true
host = "0.0.0.0"
port = 8080
bearer_token = "secret"

[access]
default_allow = false
denied_destinations = ["SECRET"]
admins = ["root"]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.master.name, "master-1");
    assert_eq!(config.ticket.check_timeout(), Duration::from_secs(600));
    assert_eq!(config.ticket.timeout_after_completion(), Duration::from_secs(60));
    assert_eq!(config.cache.transfer_ttl(), Duration::from_millis(1000));
    assert_eq!(config.cleanup.concurrency, 8);
    assert_eq!(config.cleanup.queue, 4);
    assert_eq!(config.proxy.public_port, 9000);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.bearer_token.as_deref(), Some("secret"));
    assert!(!config.access.default_allow);
    assert_eq!(config.access.admins, vec!["root"]);
}

/// An empty document yields the compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.ticket.check_timeout(), Duration::from_secs(20 * 60));
    assert_eq!(config.ticket.ticket_timeout(), Duration::from_secs(5 * 60 * 60));
    assert_eq!(config.ticket.timeout_after_completion(), Duration::from_secs(180));
    assert_eq!(config.cache.destination_ttl(), Duration::from_secs(10));
    assert_eq!(config.cache.transfer_ttl(), Duration::from_secs(2));
    assert_eq!(config.cleanup.concurrency, 100);
    assert_eq!(config.cleanup.queue, 50);
    assert_eq!(config.proxy.attachments_dir, "/tmp/ecpds-attachments");
}

/// Unknown keys surface as diagnostics with a suggestion.
#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[cleanup]
concurency = 4
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key must fail");
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "concurency");
            assert_eq!(suggestion.as_deref(), Some("concurrency"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level sections are rejected.
#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telegram]\nbot_token = \"x\"\n").expect_err("must fail");
    assert!(format!("{err}").contains("telegram"));
}

/// A wrong type becomes an InvalidType diagnostic.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[ticket]
check_timeout_secs = "soon"
"#;
    let errors = load_and_validate_str(toml).expect_err("wrong type must fail");
    assert!(matches!(
        &errors[0],
        ConfigError::InvalidType { key, .. } if key == "ticket.check_timeout_secs"
    ));
}

/// Validation runs after a successful parse.
#[test]
fn semantic_validation_applies() {
    let toml = r#"
[cleanup]
concurrency = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("zero concurrency must fail");
    assert!(matches!(
        &errors[0],
        ConfigError::Validation { key, .. } if key == "cleanup.concurrency"
    ));
}

/// Environment variables override file values.
#[test]
fn env_overrides_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "ecpds.toml",
            r#"
[ticket]
check_timeout_secs = 900
"#,
        )?;
        jail.set_env("ECPDS_TICKET_CHECK_TIMEOUT_SECS", "30");
        jail.set_env("ECPDS_GATEWAY_BEARER_TOKEN", "from-env");

        let config: EcpdsConfig =
            load_config_from_path(Path::new("ecpds.toml")).expect("config should load");
        assert_eq!(config.ticket.check_timeout_secs, 30);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("from-env"));
        Ok(())
    });
}

/// The effective config serializes back to TOML for `ecpds config`.
#[test]
fn config_serializes_to_toml() {
    let rendered = toml::to_string_pretty(&EcpdsConfig::default()).expect("serializable");
    assert!(rendered.contains("[ticket]"));
    assert!(rendered.contains("check_timeout_secs = 1200"));
}
