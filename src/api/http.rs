use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use url::Url;

use super::{FileListPage, HostService, ProgressFn, UploadBody, UploadReceipt};
use crate::error::ClientError;

/// Slice size for streamed request bodies. Each slice handed to the
/// transport advances the progress callback once.
const STREAM_SLICE: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct BeginChunksRequest<'a> {
    filename: &'a str,
}

#[derive(Debug, Deserialize)]
struct BeginChunksResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct EndChunksRequest<'a> {
    id: &'a str,
}

/// Production [`HostService`] backed by the fhost HTTP manage API.
///
/// Protocol notes: the auth token travels as the raw `Authorization` header
/// value, and `Content-Range` carries a bare integer (the total file size
/// on `begin_chunks`, the chunk's byte offset on `chunk`).
#[derive(Debug)]
pub struct HttpHostService {
    http: reqwest::Client,
    base: String,
}

impl HttpHostService {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = base_url.trim_end_matches('/').to_string();
        Url::parse(&base).map_err(|source| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait]
impl HostService for HttpHostService {
    async fn upload_file(
        &self,
        token: &str,
        filename: &str,
        body: UploadBody,
        progress: Option<ProgressFn>,
    ) -> Result<UploadReceipt, ClientError> {
        let size = body.len();
        let sniff = body.head().await?;
        let content_type = infer::get(&sniff)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");

        let part = Part::stream_with_length(progress_body(body, progress), size)
            .file_name(filename.to_string())
            .mime_str(content_type)?;

        let resp = self
            .http
            .post(self.url("/manage/upload/file"))
            .header(AUTHORIZATION, token)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn begin_chunked_upload(
        &self,
        token: &str,
        filename: &str,
        total_size: u64,
    ) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.url("/manage/upload/begin_chunks"))
            .header(AUTHORIZATION, token)
            .header(CONTENT_RANGE, total_size.to_string())
            .json(&BeginChunksRequest { filename })
            .send()
            .await?;

        let body: BeginChunksResponse = check(resp).await?.json().await?;
        Ok(body.id)
    }

    async fn upload_chunk(
        &self,
        token: &str,
        upload_id: &str,
        offset: u64,
        body: UploadBody,
        progress: Option<ProgressFn>,
    ) -> Result<(), ClientError> {
        let size = body.len();
        let part = Part::stream_with_length(progress_body(body, progress), size)
            .mime_str("application/octet-stream")?;

        let resp = self
            .http
            .post(self.url(&format!("/manage/upload/chunk/{upload_id}")))
            .header(AUTHORIZATION, token)
            .header(CONTENT_RANGE, offset.to_string())
            .multipart(Form::new().part("chunk", part))
            .send()
            .await?;

        check(resp).await?;
        Ok(())
    }

    async fn end_chunked_upload(
        &self,
        token: &str,
        upload_id: &str,
    ) -> Result<UploadReceipt, ClientError> {
        let resp = self
            .http
            .post(self.url("/manage/upload/end_chunks"))
            .header(AUTHORIZATION, token)
            .json(&EndChunksRequest { id: upload_id })
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn discard_chunked_upload(
        &self,
        token: &str,
        upload_id: &str,
    ) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("/manage/upload/discard/{upload_id}")))
            .header(AUTHORIZATION, token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        check(resp).await?;
        Ok(())
    }

    async fn list_files(&self, token: &str, page: u64) -> Result<FileListPage, ClientError> {
        let resp = self
            .http
            .get(self.url("/manage/files"))
            .header(AUTHORIZATION, token)
            .query(&[("page", page)])
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn delete_file(&self, token: &str, id: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/manage/files/{id}")))
            .header(AUTHORIZATION, token)
            .send()
            .await?;

        check(resp).await?;
        Ok(())
    }
}

/// Maps non-2xx responses to `ClientError::Service`, reading the body as
/// the user-visible message.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::service(status, body))
}

/// Wraps the payload in a streaming body that yields bounded slices and
/// reports cumulative bytes as the transport consumes them. File ranges
/// are read straight from disk, so memory use stays at one slice per
/// in-flight request regardless of payload size.
fn progress_body(body: UploadBody, progress: Option<ProgressFn>) -> reqwest::Body {
    match body {
        UploadBody::Memory(data) => {
            reqwest::Body::wrap_stream(sliced_with_progress(data, progress))
        }
        UploadBody::FileRange { path, offset, len } => {
            reqwest::Body::wrap_stream(file_range_with_progress(path, offset, len, progress))
        }
    }
}

/// Yields `data` in slices of at most [`STREAM_SLICE`] bytes. The callback
/// fires after each slice is handed off, so the final `(total, total)`
/// report lands once the whole body has been consumed.
fn sliced_with_progress(
    data: Bytes,
    progress: Option<ProgressFn>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len() as u64;
    async_stream::stream! {
        let mut rest = data;
        let mut sent = 0u64;
        while !rest.is_empty() {
            let piece = rest.split_to(rest.len().min(STREAM_SLICE));
            sent += piece.len() as u64;
            yield Ok(piece);
            if let Some(report) = &progress {
                report(sent, total);
            }
        }
    }
}

/// Streams the byte range `[offset, offset + len)` of the file at `path`,
/// reporting cumulative bytes per piece. Errors if the file ends before
/// the range does, so a source truncated mid-upload fails the request
/// instead of silently shortening it.
fn file_range_with_progress(
    path: PathBuf,
    offset: u64,
    len: u64,
    progress: Option<ProgressFn>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    async_stream::try_stream! {
        let mut file = fs::File::open(&path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut sent = 0u64;
        let reader = ReaderStream::with_capacity(file.take(len), STREAM_SLICE);
        for await piece in reader {
            let piece = piece?;
            sent += piece.len() as u64;
            yield piece;
            if let Some(report) = &progress {
                report(sent, len);
            }
        }
        if sent < len {
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "source file shorter than the planned upload",
            ))?;
        }
    }
}
