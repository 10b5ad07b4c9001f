//! The two ways of assembling parts into a destination.

use tracing::debug;

use partmerge_core::error::AppError;
use partmerge_core::result::AppResult;
use partmerge_core::traits::{
    CancellationRegistry, MergeObserver, RandomAccessWriter, StorageBackend,
};
use partmerge_core::types::{
    DestinationHandle, MAX_RANDOM_ACCESS_PART_SIZE, UploadPart, UploadSession, object_extension,
};

/// How a strategy run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrategyEnd {
    Finished,
    Cancelled,
}

/// Mutable state shared between a strategy and the engine's cleanup.
#[derive(Debug, Default)]
pub(crate) struct MergeProgress {
    /// Destination created so far, if any.
    pub destination: Option<DestinationHandle>,
    /// Parts fully written to the destination.
    pub parts_merged: usize,
}

/// Dependencies a strategy needs for one run.
pub(crate) struct MergeContext<'a> {
    pub session: &'a UploadSession,
    pub backend: &'a dyn StorageBackend,
    pub cancellations: &'a dyn CancellationRegistry,
    pub observer: &'a dyn MergeObserver,
}

impl MergeContext<'_> {
    async fn cancel_requested(&self) -> AppResult<bool> {
        self.cancellations
            .need_cancel(&self.session.upload_id)
            .await
    }
}

/// Write every part at its cumulative offset in one destination.
///
/// `parts` must already be sorted. Each part must be smaller than 4 GiB.
pub(crate) async fn concatenate(
    ctx: &MergeContext<'_>,
    parts: Vec<UploadPart>,
    progress: &mut MergeProgress,
) -> AppResult<StrategyEnd> {
    if let Some(part) = parts
        .iter()
        .find(|p| p.part_size >= MAX_RANDOM_ACCESS_PART_SIZE)
    {
        return Err(AppError::validation(format!(
            "Part {} is {} bytes; random-access merges require parts under {} bytes",
            part.part_number, part.part_size, MAX_RANDOM_ACCESS_PART_SIZE
        )));
    }

    let upload_id = ctx.session.upload_id;
    let mut writer: Option<Box<dyn RandomAccessWriter>> = None;
    let mut offset = 0u64;

    for part in parts {
        if ctx.cancel_requested().await? {
            debug!(upload_id = %upload_id, part_number = part.part_number, "Stopping before part");
            return Ok(StrategyEnd::Cancelled);
        }

        let w = match &mut writer {
            Some(w) => w,
            slot @ None => {
                let (handle, opened) = ctx
                    .backend
                    .open_for_random_write(&ctx.session.object_name)
                    .await?;
                progress.destination = Some(handle);
                slot.insert(opened)
            }
        };

        let written = w.write_at(offset, part.content, part.part_size).await?;
        ctx.observer
            .on_part_merged(&upload_id, part.part_number, offset, written);
        offset += written;
        progress.parts_merged += 1;
    }

    if let Some(w) = writer {
        w.finish().await?;
    }
    Ok(StrategyEnd::Finished)
}

/// Create the destination from the first part and append the rest.
///
/// `parts` must already be sorted.
pub(crate) async fn append_chain(
    ctx: &MergeContext<'_>,
    parts: Vec<UploadPart>,
    progress: &mut MergeProgress,
) -> AppResult<StrategyEnd> {
    let upload_id = ctx.session.upload_id;
    let extension = object_extension(&ctx.session.object_name);
    let mut offset = 0u64;

    for part in parts {
        if ctx.cancel_requested().await? {
            debug!(upload_id = %upload_id, part_number = part.part_number, "Stopping before part");
            return Ok(StrategyEnd::Cancelled);
        }

        match &progress.destination {
            None => {
                let handle = ctx
                    .backend
                    .create_from_stream(part.content, part.part_size, extension)
                    .await?;
                progress.destination = Some(handle);
            }
            Some(handle) => {
                ctx.backend
                    .append_to_destination(handle, part.content, part.part_size)
                    .await?;
            }
        }

        ctx.observer
            .on_part_merged(&upload_id, part.part_number, offset, part.part_size);
        offset += part.part_size;
        progress.parts_merged += 1;
    }

    Ok(StrategyEnd::Finished)
}
