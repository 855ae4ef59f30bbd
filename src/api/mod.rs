//! Service boundary for the fhost manage API.
//!
//! All HTTP traffic goes through the [`HostService`] trait; upload
//! orchestration never builds requests itself, which keeps the session
//! protocol testable against an in-memory implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub mod body;
pub mod http;

pub use body::UploadBody;
pub use http::HttpHostService;

/// Files per page returned by the listing endpoint.
pub const PAGE_SIZE: u64 = 10;

/// Byte-level transfer progress callback: `(bytes_sent, bytes_total)`.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Outcome of a stored upload. `existed` is true when the service already
/// held an identical file and deduplicated instead of storing a new copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: String,
    pub existed: bool,
}

/// One stored file as reported by the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub filename: String,
    pub bytes: u64,
}

/// One page of the file listing plus the total count across all pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListPage {
    pub files: Vec<FileEntry>,
    pub total: u64,
}

impl FileListPage {
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(PAGE_SIZE)
    }
}

#[async_trait]
pub trait HostService: Send + Sync {
    /// Single-request upload of a whole file.
    async fn upload_file(
        &self,
        token: &str,
        filename: &str,
        body: UploadBody,
        progress: Option<ProgressFn>,
    ) -> Result<UploadReceipt, ClientError>;

    /// Open a chunked upload session; returns the session id.
    async fn begin_chunked_upload(
        &self,
        token: &str,
        filename: &str,
        total_size: u64,
    ) -> Result<String, ClientError>;

    /// Upload one chunk at `offset` within an open session.
    async fn upload_chunk(
        &self,
        token: &str,
        upload_id: &str,
        offset: u64,
        body: UploadBody,
        progress: Option<ProgressFn>,
    ) -> Result<(), ClientError>;

    /// Finalize a session; the server assembles and stores the file.
    async fn end_chunked_upload(
        &self,
        token: &str,
        upload_id: &str,
    ) -> Result<UploadReceipt, ClientError>;

    /// Abort a session and drop any chunks the server holds for it.
    async fn discard_chunked_upload(
        &self,
        token: &str,
        upload_id: &str,
    ) -> Result<(), ClientError>;

    /// One page of stored files. Pages start at 1, mirroring the
    /// service's own pagination.
    async fn list_files(&self, token: &str, page: u64) -> Result<FileListPage, ClientError>;

    /// Delete a stored file by id.
    async fn delete_file(&self, token: &str, id: &str) -> Result<(), ClientError>;
}
