//! Upload local files as parts of one object and merge them.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::io::ReaderStream;

use crate::output::{self, OutputFormat};
use partmerge_core::config::AppConfig;
use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::types::{MergeOutcome, PartInfo, UploadId, UploadPart};
use partmerge_service::MergeEngine;

/// Arguments for the merge command
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Name of the object to assemble
    #[arg(short, long)]
    pub object: String,

    /// Part numbers for each file, comma separated (default: 1, 2, 3, ...)
    #[arg(short, long, value_delimiter = ',')]
    pub part_numbers: Option<Vec<u32>>,

    /// Files to upload, one per part
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Row in the staged-parts table
#[derive(Debug, Serialize, Tabled)]
struct PartRow {
    #[tabled(rename = "Part")]
    part_number: u32,
    #[tabled(rename = "Bytes")]
    part_size: u64,
}

impl From<PartInfo> for PartRow {
    fn from(info: PartInfo) -> Self {
        Self {
            part_number: info.part_number,
            part_size: info.part_size,
        }
    }
}

/// Execute the merge command
pub async fn execute(
    args: &MergeArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let numbers = part_numbers(args)?;
    let engine = MergeEngine::from_config(config).await?;
    let upload_id = engine.sessions().initiate(&args.object)?;

    if let Err(e) = stage_files(&engine, upload_id, &args.files, &numbers).await {
        discard(&engine, &upload_id).await;
        return Err(e);
    }

    if format == OutputFormat::Table {
        let parts = engine.sessions().list_parts(&upload_id, &args.object).await?;
        let rows: Vec<PartRow> = parts.into_iter().map(PartRow::from).collect();
        output::print_list(&rows, format);
    }

    match engine.complete(&upload_id, &args.object).await {
        Ok(MergeOutcome::Completed(result)) => {
            output::print_item(&result, format);
            Ok(())
        }
        Ok(MergeOutcome::Cancelled) => {
            output::print_warning(&format!("Merge of '{}' was cancelled", args.object));
            Ok(())
        }
        Err(e) => {
            discard(&engine, &upload_id).await;
            Err(e)
        }
    }
}

/// Resolve the part number of each file.
fn part_numbers(args: &MergeArgs) -> Result<Vec<u32>, AppError> {
    let Some(numbers) = &args.part_numbers else {
        return (1..=args.files.len())
            .map(|n| {
                u32::try_from(n).map_err(|_| AppError::validation("Too many files for one upload"))
            })
            .collect();
    };

    if numbers.len() != args.files.len() {
        return Err(AppError::validation(format!(
            "Got {} part numbers for {} files",
            numbers.len(),
            args.files.len()
        )));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = numbers.iter().find(|n| !seen.insert(**n)) {
        return Err(AppError::validation(format!("Duplicate part number {dup}")));
    }
    Ok(numbers.clone())
}

/// Stream each file into the part store.
async fn stage_files(
    engine: &MergeEngine,
    upload_id: UploadId,
    files: &[PathBuf],
    numbers: &[u32],
) -> Result<(), AppError> {
    for (path, &part_number) in files.iter().zip(numbers) {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Storage
            };
            AppError::with_source(kind, format!("Failed to open {}", path.display()), e)
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to stat {}", path.display()),
                    e,
                )
            })?
            .len();

        let part = UploadPart::new(
            upload_id,
            part_number,
            size,
            Box::pin(ReaderStream::new(file)),
        );
        engine.sessions().put_part(part).await?;
        tracing::info!(part_number, size, file = %path.display(), "Staged part");
    }
    Ok(())
}

/// Best-effort removal of a failed upload's staged parts.
async fn discard(engine: &MergeEngine, upload_id: &UploadId) {
    if let Err(e) = engine.abort(upload_id).await {
        tracing::warn!(upload_id = %upload_id, error = %e, "Failed to discard upload");
    }
}
