use std::io::{self, SeekFrom};
use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// How many leading bytes [`UploadBody::head`] reads for MIME sniffing.
const SNIFF_LEN: usize = 8192;

/// The payload of a single upload request.
///
/// `Memory` carries bytes already in RAM. `FileRange` is a lazy view of a
/// byte range of a file on disk; nothing is read until the request body is
/// streamed, so any number of ranges can be in flight without buffering
/// their contents.
#[derive(Debug, Clone)]
pub enum UploadBody {
    Memory(Bytes),
    FileRange { path: PathBuf, offset: u64, len: u64 },
}

impl UploadBody {
    /// Payload length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            UploadBody::Memory(data) => data.len() as u64,
            UploadBody::FileRange { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first bytes of the payload (8 KiB at most), for MIME sniffing
    /// ahead of the actual transfer.
    pub async fn head(&self) -> io::Result<Bytes> {
        match self {
            UploadBody::Memory(data) => Ok(data.slice(..data.len().min(SNIFF_LEN))),
            UploadBody::FileRange { path, offset, len } => {
                let mut file = fs::File::open(path).await?;
                file.seek(SeekFrom::Start(*offset)).await?;
                let mut buf = Vec::new();
                file.take((SNIFF_LEN as u64).min(*len))
                    .read_to_end(&mut buf)
                    .await?;
                Ok(buf.into())
            }
        }
    }

    /// Buffers the whole payload. Streaming transports should not call
    /// this; it exists for in-memory backends and tests.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            UploadBody::Memory(data) => Ok(data),
            UploadBody::FileRange { path, offset, len } => {
                let mut file = fs::File::open(&path).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut buf = vec![0u8; len as usize];
                file.read_exact(&mut buf).await?;
                Ok(buf.into())
            }
        }
    }
}
