//! CLI command implementations
//!
//! Exit codes shared by every command:
//! - `0` success
//! - `1` completed with failed files/records or residual identifiers
//! - `2` configuration error
//! - `3` mapping store or key error
//! - `5` fatal error
//! - `130` interrupted by a shutdown signal

pub mod deidentify;
pub mod keygen;
pub mod validate;
pub mod validate_config;

use crate::config::{load_config, load_default_config, VeilConfig};
use crate::domain::Result;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "veil.toml";

/// Load the explicit config file, else `veil.toml` when present, else defaults
pub(crate) fn load_settings(config_path: Option<&str>) -> Result<VeilConfig> {
    match config_path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config(DEFAULT_CONFIG_FILE),
        None => {
            tracing::debug!("No configuration file; using defaults");
            load_default_config()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeidError;

    #[test]
    fn test_load_settings_explicit_missing_file() {
        assert!(matches!(
            load_settings(Some("missing-veil-config.toml")),
            Err(DeidError::Config(_))
        ));
    }
}
