//! Client library for the fhost file-hosting service.
//!
//! Small files go up in a single multipart request; files over the
//! threshold run through a begin / chunks / end session with every chunk
//! uploaded concurrently and per-chunk progress folded into one 0-100
//! stream. Failed sessions are discarded server-side while the original
//! error reaches the caller.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use api::{
    FileEntry, FileListPage, HostService, HttpHostService, PAGE_SIZE, ProgressFn, UploadBody,
    UploadReceipt,
};
pub use config::ClientConfig;
pub use error::ClientError;
pub use services::uploader::{UploadOptions, UploadSource, UploadStrategy, Uploader};
