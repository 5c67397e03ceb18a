//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::VeilConfig;
use crate::config::secret_string;
use crate::domain::errors::DeidError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into VeilConfig
/// 4. Applies environment variable overrides (VEIL_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`DeidError::Config`] if the file cannot be read or parsed, a
/// referenced environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use veil::config::loader::load_config;
///
/// let config = load_config("veil.toml")?;
/// println!("Countries: {}", config.deidentification.countries);
/// # Ok::<(), veil::domain::DeidError>(())
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<VeilConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DeidError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DeidError::Config(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: VeilConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config)?;

    config
        .validate()
        .map_err(|e| DeidError::Config(format!("Configuration validation failed: {e}")))?;

    Ok(config)
}

/// Default configuration with `VEIL_*` overrides applied, for runs without a file
pub fn load_default_config() -> Result<VeilConfig> {
    let mut config = VeilConfig::default();
    apply_env_overrides(&mut config)?;
    config
        .validate()
        .map_err(|e| DeidError::Config(format!("Configuration validation failed: {e}")))?;
    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| DeidError::Config(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(DeidError::Config(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    value
        .trim()
        .parse()
        .map_err(|_| DeidError::Config(format!("{name} must be 'true' or 'false'")))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DeidError::Config(format!("{name} must be a number")))
}

/// Applies environment variable overrides using the VEIL_* prefix
///
/// Environment variables follow the pattern: VEIL_<SECTION>_<KEY>
/// For example: VEIL_DEIDENTIFICATION_COUNTRIES, VEIL_DATASET_WORKERS
fn apply_env_overrides(config: &mut VeilConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("VEIL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // De-identification overrides
    let deid = &mut config.deidentification;
    if let Some(val) = var("VEIL_DEIDENTIFICATION_COUNTRIES") {
        deid.countries = val.parse().map_err(DeidError::Config)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_ENABLE_DATE_SHIFTING") {
        deid.enable_date_shifting = parse_bool("VEIL_DEIDENTIFICATION_ENABLE_DATE_SHIFTING", &val)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_DATE_SHIFT_RANGE_DAYS") {
        deid.date_shift_range_days =
            parse_number("VEIL_DEIDENTIFICATION_DATE_SHIFT_RANGE_DAYS", &val)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_PRESERVE_DATE_INTERVALS") {
        deid.preserve_date_intervals =
            parse_bool("VEIL_DEIDENTIFICATION_PRESERVE_DATE_INTERVALS", &val)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_ENABLE_VALIDATION") {
        deid.enable_validation = parse_bool("VEIL_DEIDENTIFICATION_ENABLE_VALIDATION", &val)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_STRICT_MODE") {
        deid.strict_mode = parse_bool("VEIL_DEIDENTIFICATION_STRICT_MODE", &val)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_LOG_DETECTIONS") {
        deid.log_detections = parse_bool("VEIL_DEIDENTIFICATION_LOG_DETECTIONS", &val)?;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_MAPPING_PATH") {
        deid.mapping_path = Some(val);
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_SALT") {
        deid.salt = Some(secret_string(val));
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_KEY_SOURCE") {
        deid.encryption.key_source = match val.to_lowercase().as_str() {
            "file" => super::schema::KeySource::File,
            "env" => super::schema::KeySource::Env,
            _ => {
                return Err(DeidError::Config(
                    "VEIL_DEIDENTIFICATION_KEY_SOURCE must be 'file' or 'env'".to_string(),
                ))
            }
        };
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_KEY_FILE") {
        deid.encryption.key_file = val;
    }
    if let Some(val) = var("VEIL_DEIDENTIFICATION_KEY_ENV") {
        deid.encryption.key_env = val;
    }

    // Dataset overrides
    if let Some(val) = var("VEIL_DATASET_WORKERS") {
        config.dataset.workers = parse_number("VEIL_DATASET_WORKERS", &val)?;
    }
    if let Some(val) = var("VEIL_DATASET_PERSIST_MODE") {
        config.dataset.persist_mode = val;
    }

    // Logging overrides
    if let Some(val) = var("VEIL_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_bool("VEIL_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("VEIL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = var("VEIL_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
