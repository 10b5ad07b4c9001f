//! Configuration inspection command.

use clap::Args;

use crate::output::{self, OutputFormat};
use partmerge_core::config::AppConfig;
use partmerge_core::error::AppError;

/// Arguments for the config command
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Print only this section (storage, staging, upload, logging)
    #[arg(short, long)]
    pub section: Option<String>,
}

/// Print the merged configuration
pub async fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match args.section.as_deref() {
        None => output::print_item(config, format),
        Some("storage") => output::print_item(&config.storage, format),
        Some("staging") => output::print_item(&config.staging, format),
        Some("upload") => output::print_item(&config.upload, format),
        Some("logging") => output::print_item(&config.logging, format),
        Some(other) => {
            return Err(AppError::validation(format!(
                "Unknown config section: {other}"
            )));
        }
    }
    Ok(())
}
