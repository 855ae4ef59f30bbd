use thiserror::Error;

/// Errors surfaced by the fhost client.
///
/// The `Display` impl is the user-visible message. For `Service` errors the
/// server's own error payload is shown verbatim, matching what the hosting
/// service renders in its web frontend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No auth token is configured. Raised before any network activity.
    #[error("no auth token configured (set FHOST_TOKEN or run `fhost token <value>`)")]
    MissingToken,

    /// The service answered with a non-success status.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// The request never produced a usable response (connect, timeout,
    /// body decode).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A spawned chunk upload task panicked.
    #[error("chunk upload task failed: {0}")]
    ChunkJoin(#[from] tokio::task::JoinError),
}

impl ClientError {
    /// Builds a `Service` error from a status code and raw response body,
    /// falling back to the status line when the body is empty.
    pub fn service(status: reqwest::StatusCode, body: String) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body
        };
        ClientError::Service {
            status: status.as_u16(),
            message,
        }
    }
}
