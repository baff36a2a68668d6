// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the ECPDS master.
//!
//! TOML configuration with strict key checking (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `ECPDS_` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use ecpds_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("check timeout: {:?}", config.ticket.check_timeout());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, SourceIndex, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::EcpdsConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment failures are converted into diagnostics pointing into the TOML
/// files that were read; deserialized configs then go through
/// [`validation::validate_config`].
pub fn load_and_validate() -> Result<EcpdsConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load a specific file with env overrides and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<EcpdsConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let mut sources = SourceIndex::new();
            if let Ok(content) = std::fs::read_to_string(path) {
                sources.add(path.display().to_string(), content);
            }
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<EcpdsConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let mut sources = SourceIndex::new();
            sources.add("<inline>", toml_content);
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn collect_toml_sources() -> SourceIndex {
    let mut sources = SourceIndex::new();
    let mut candidates = vec![std::path::PathBuf::from("/etc/ecpds/ecpds.toml")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("ecpds/ecpds.toml"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("ecpds.toml"));
    }
    for path in candidates {
        if let Ok(content) = std::fs::read_to_string(&path) {
            sources.add(path.display().to_string(), content);
        }
    }
    sources
}
