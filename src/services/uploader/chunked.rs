use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info, warn};

use super::progress::{ProgressTracker, percent_of};
use super::source::UploadSource;
use super::{PercentFn, Uploader};
use crate::api::{ProgressFn, UploadReceipt};
use crate::error::ClientError;

/// One planned chunk: the byte range `[offset, offset + len)` of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: usize,
    pub offset: u64,
    pub len: u64,
}

/// Partitions `[0, size)` into consecutive `chunk_size` ranges; the final
/// chunk keeps the remainder. `chunk_size` must be non-zero.
pub fn plan_chunks(size: u64, chunk_size: u64) -> Vec<ChunkSpec> {
    assert!(chunk_size > 0, "chunk size must be non-zero");

    let mut chunks = Vec::with_capacity(size.div_ceil(chunk_size) as usize);
    let mut offset = 0;
    while offset < size {
        let len = chunk_size.min(size - offset);
        chunks.push(ChunkSpec {
            index: chunks.len(),
            offset,
            len,
        });
        offset += len;
    }
    chunks
}

impl Uploader {
    /// Runs the three-phase chunked session: begin, all chunks at once,
    /// end. The first chunk or finalize failure discards the session and
    /// is returned to the caller.
    pub(crate) async fn upload_chunked(
        &self,
        source: &UploadSource,
        token: &str,
        on_progress: PercentFn,
    ) -> Result<UploadReceipt, ClientError> {
        let total = source.size();
        let chunks = plan_chunks(total, self.options.chunk_size);
        info!(
            "📦 Chunked upload: {} ({} bytes, {} chunks)",
            source.name(),
            total,
            chunks.len()
        );

        let upload_id = self
            .api
            .begin_chunked_upload(token, source.name(), total)
            .await?;

        let tracker = Arc::new(ProgressTracker::new(chunks.len(), move |percent| {
            on_progress(percent)
        }));

        let mut tasks: FuturesUnordered<_> = chunks
            .iter()
            .map(|spec| {
                let spec = *spec;
                let api = Arc::clone(&self.api);
                let source = source.clone();
                let token = token.to_string();
                let upload_id = upload_id.clone();
                let tracker = Arc::clone(&tracker);

                tokio::spawn(async move {
                    let body = source.body(spec.offset, spec.len)?;
                    let report: ProgressFn = Box::new(move |sent, total| {
                        tracker.update(spec.index, percent_of(sent, total));
                    });
                    api.upload_chunk(&token, &upload_id, spec.offset, body, Some(report))
                        .await
                })
            })
            .collect();

        // First failure wins. Dropping the unfinished handles detaches the
        // tasks rather than aborting them, so in-flight sibling chunks run
        // to completion in the background.
        let mut outcome: Result<(), ClientError> = Ok(());
        while let Some(joined) = tasks.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(ClientError::ChunkJoin(join_err)),
            };
            if let Err(err) = result {
                outcome = Err(err);
                break;
            }
        }

        if let Err(err) = outcome {
            // Siblings may still be running detached; stop their progress
            // reports before the caller sees the terminal error.
            tracker.close();
            error!("❌ Chunk upload failed for session {upload_id}: {err}");
            self.discard_session(token, &upload_id).await;
            return Err(err);
        }

        match self.api.end_chunked_upload(token, &upload_id).await {
            Ok(receipt) => {
                info!(
                    "✅ Chunked upload complete: {} (id {})",
                    source.name(),
                    receipt.id
                );
                Ok(receipt)
            }
            Err(err) => {
                error!("❌ Finalize failed for session {upload_id}: {err}");
                self.discard_session(token, &upload_id).await;
                Err(err)
            }
        }
    }

    /// Best-effort session discard. A discard failure is logged and
    /// swallowed; the error that triggered it is the one the caller sees.
    async fn discard_session(&self, token: &str, upload_id: &str) {
        if let Err(err) = self.api.discard_chunked_upload(token, upload_id).await {
            warn!("⚠️ Failed to discard upload session {upload_id}: {err}");
        }
    }
}
