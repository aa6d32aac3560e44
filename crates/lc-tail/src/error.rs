//! Tail engine error types.

/// Errors surfaced by the log tail engine.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// The log store answered with a non-success status.
    #[error("Log cache returned HTTP {status}: {message}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Response body, trimmed.
        message: String,
    },

    /// The HTTP exchange itself failed (connect, TLS, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response could not be interpreted as an envelope batch.
    #[error("Malformed log cache response: {0}")]
    Decode(String),

    /// JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("URL parsing failed: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid configuration.
    #[error("Invalid tail configuration: {0}")]
    InvalidConfig(String),
}

impl TailError {
    /// True for failures of the exchange with the store, including responses
    /// that could not be decoded.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Http(_) | Self::Decode(_) | Self::Json(_)
        )
    }

    /// HTTP status of a rejected request, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for tail operations.
pub type TailResult<T> = Result<T, TailError>;
