use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;

use crate::api::UploadBody;

/// A named upload input.
///
/// Path-backed sources hand out lazy file ranges, so a chunk task never
/// holds its payload in memory; the transport streams it straight from
/// disk. Memory-backed sources slice without copying.
#[derive(Debug, Clone)]
pub struct UploadSource {
    name: String,
    size: u64,
    origin: Origin,
}

#[derive(Debug, Clone)]
enum Origin {
    Path(PathBuf),
    Memory(Bytes),
}

impl UploadSource {
    /// Opens a source from disk, taking the upload name from the file name.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| "upload.bin".to_string());

        Ok(Self {
            name,
            size: meta.len(),
            origin: Origin::Path(path.to_path_buf()),
        })
    }

    /// Wraps in-memory data as a source.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            origin: Origin::Memory(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Request body for the byte range `[offset, offset + len)`.
    pub fn body(&self, offset: u64, len: u64) -> io::Result<UploadBody> {
        match &self.origin {
            Origin::Memory(data) => {
                let end = offset
                    .checked_add(len)
                    .filter(|&end| end <= data.len() as u64)
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::UnexpectedEof, "range past end of source")
                    })?;
                Ok(UploadBody::Memory(
                    data.slice(offset as usize..end as usize),
                ))
            }
            Origin::Path(path) => Ok(UploadBody::FileRange {
                path: path.clone(),
                offset,
                len,
            }),
        }
    }
}
