//! CLI command definitions and dispatch.

pub mod config;
pub mod merge;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use partmerge_core::config::AppConfig;
use partmerge_core::error::AppError;

/// partmerge: stage file parts and merge them onto a storage backend
#[derive(Debug, Parser)]
#[command(name = "partmerge", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and environment overlays
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: String,

    /// Environment overlay to apply (config/{env}.toml)
    #[arg(short, long, global = true, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload files as numbered parts of one object and merge them
    Merge(merge::MergeArgs),
    /// Print the effective configuration
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Merge(args) => merge::execute(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, self.format).await,
        }
    }
}
