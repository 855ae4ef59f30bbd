use std::sync::Arc;

use tracing::info;

use crate::api::{HostService, ProgressFn, UploadReceipt};
use crate::config::{ClientConfig, DEFAULT_CHUNK_SIZE, DEFAULT_UPLOAD_THRESHOLD};
use crate::error::ClientError;

pub mod chunked;
pub mod progress;
pub mod source;

pub use chunked::{ChunkSpec, plan_chunks};
pub use source::UploadSource;

use progress::percent_of;

/// Whole-upload percent callback, shared with every chunk task.
pub(crate) type PercentFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Tuning for upload strategy selection.
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Files strictly larger than this take the chunked path.
    pub threshold: u64,
    /// Chunk size for the chunked path.
    pub chunk_size: u64,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_UPLOAD_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl From<&ClientConfig> for UploadOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            threshold: config.upload_threshold,
            chunk_size: config.chunk_size,
        }
    }
}

/// Which upload path a file takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// One request carrying the whole file.
    Simple,
    /// Begin / chunks / end session.
    Chunked,
}

impl UploadStrategy {
    /// Strictly-greater comparison: a file of exactly the threshold size
    /// still uploads in one request.
    pub fn for_size(size: u64, options: &UploadOptions) -> Self {
        if size > options.threshold {
            UploadStrategy::Chunked
        } else {
            UploadStrategy::Simple
        }
    }
}

/// Uploads files to the hosting service, picking the strategy by size.
pub struct Uploader {
    api: Arc<dyn HostService>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(api: Arc<dyn HostService>, options: UploadOptions) -> Self {
        Self { api, options }
    }

    /// Uploads `source` and returns the stored file receipt.
    ///
    /// Fails with [`ClientError::MissingToken`] before any network
    /// activity when `token` is absent or blank. `on_progress` receives
    /// whole-upload percents in `0..=100`; the terminal result follows the
    /// last report.
    pub async fn upload(
        &self,
        source: &UploadSource,
        token: Option<&str>,
        on_progress: impl Fn(u8) + Send + Sync + 'static,
    ) -> Result<UploadReceipt, ClientError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingToken)?;
        let on_progress: PercentFn = Arc::new(on_progress);

        match UploadStrategy::for_size(source.size(), &self.options) {
            UploadStrategy::Simple => self.upload_simple(source, token, on_progress).await,
            UploadStrategy::Chunked => self.upload_chunked(source, token, on_progress).await,
        }
    }

    async fn upload_simple(
        &self,
        source: &UploadSource,
        token: &str,
        on_progress: PercentFn,
    ) -> Result<UploadReceipt, ClientError> {
        info!(
            "📄 Uploading {} in one request ({} bytes)",
            source.name(),
            source.size()
        );

        let body = source.body(0, source.size())?;
        let report: ProgressFn = Box::new(move |sent, total| on_progress(percent_of(sent, total)));

        let receipt = self
            .api
            .upload_file(token, source.name(), body, Some(report))
            .await?;

        info!("✅ Upload complete: {} (id {})", source.name(), receipt.id);
        Ok(receipt)
    }
}
