//! Stream-to-writer copy shared by the disk-backed stores.

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::result::AppResult;
use partmerge_core::types::ByteStream;

/// Drain `stream` into `writer` chunk by chunk and return the byte count.
///
/// Never holds more than one chunk in memory.
pub(crate) async fn copy_stream<W>(writer: &mut W, mut stream: ByteStream) -> AppResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut total_bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
        total_bytes += chunk.len() as u64;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e))?;
    }

    writer
        .flush()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush", e))?;

    Ok(total_bytes)
}

/// Error for a transfer that moved a different number of bytes than declared.
pub(crate) fn size_mismatch(what: &str, expected: u64, actual: u64) -> AppError {
    AppError::storage(format!(
        "Short transfer for {what}: expected {expected} bytes, got {actual}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_copy_stream_counts_bytes() {
        let stream: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from("abc")),
            Ok(Bytes::from("defgh")),
        ]));
        let mut out = Vec::new();
        let n = copy_stream(&mut out, stream).await.unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_copy_stream_propagates_read_error() {
        let stream: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from("abc")),
            Err(std::io::Error::other("connection reset")),
        ]));
        let mut out = Vec::new();
        let err = copy_stream(&mut out, stream).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }
}
