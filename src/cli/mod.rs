//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Veil using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Veil - clinical research records de-identification
#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(version, about, long_about = None)]
#[command(author = "Veil Contributors")]
pub struct Cli {
    /// Path to configuration file (defaults apply when absent)
    #[arg(short, long, env = "VEIL_CONFIG")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "VEIL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// De-identify every record file under an input directory
    Deidentify(commands::deidentify::DeidentifyArgs),

    /// Re-scan a de-identified output directory for residual identifiers
    Validate(commands::validate::ValidateArgs),

    /// Create or rotate the mapping store key
    Keygen(commands::keygen::KeygenArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate_config::ValidateConfigArgs),
}
