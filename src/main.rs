//! partmerge: multipart upload coordinator
//!
//! Entry point that loads configuration, initialises logging and runs the
//! selected command.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod output;

use commands::Cli;
use partmerge_core::config::AppConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config_dir, &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::debug!(config_dir = %cli.config_dir, env = %cli.env, "Configuration loaded");

    if let Err(e) = cli.execute(config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging. Logs go to stderr so command output stays parseable.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
