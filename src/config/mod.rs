use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files strictly larger than this are uploaded in chunks (default: 80 MiB)
pub const DEFAULT_UPLOAD_THRESHOLD: u64 = 80 * 1024 * 1024;

/// Size of each chunk in a chunked upload (default: 50 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Client configuration for the fhost service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the hosting service (default: "http://127.0.0.1:9999")
    pub base_url: String,

    /// Auth token for the manage API, if one is configured
    pub token: Option<String>,

    /// Where the token is persisted (default: ~/.config/fhost/token)
    pub token_file: PathBuf,

    /// Chunked-upload threshold in bytes; files strictly larger than this
    /// are chunked (default: 80 MiB)
    pub upload_threshold: u64,

    /// Chunk size in bytes for chunked uploads (default: 50 MiB)
    pub chunk_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9999".to_string(),
            token: None,
            token_file: default_token_file(),
            upload_threshold: DEFAULT_UPLOAD_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// `FHOST_TOKEN` takes precedence over the token file; both may be
    /// absent, in which case operations that need auth fail up front.
    pub fn from_env() -> Self {
        let default = Self::default();

        let token_file = env::var("FHOST_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or(default.token_file);

        let token = env::var("FHOST_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| read_token_file(&token_file));

        Self {
            base_url: env::var("FHOST_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.base_url),

            token,
            token_file,

            upload_threshold: env::var("FHOST_UPLOAD_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_threshold),

            chunk_size: env::var("FHOST_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v: &u64| v > 0)
                .unwrap_or(default.chunk_size),
        }
    }

    /// Public download URL for a stored file id.
    pub fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.base_url.trim_end_matches('/'), id)
    }

    /// Persist `token` to the token file, creating parent directories.
    pub fn save_token(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.token_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.token_file, format!("{}\n", token.trim()))
    }
}

fn read_token_file(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn default_token_file() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".config").join("fhost").join("token"))
        .unwrap_or_else(|| PathBuf::from(".fhost-token"))
}
