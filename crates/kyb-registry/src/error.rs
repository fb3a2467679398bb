//! Adapter error types.

use thiserror::Error;

/// Errors a registry adapter reports for one fetch.
///
/// Everything except [`AdapterError::InvalidIdentifier`] is retryable.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The identifier is malformed or rejected by the registry. Retrying
    /// cannot help until the tenant corrects it.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Transport failure, timeout, or server-side error.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The registry returned a 429 Too Many Requests response.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The response could not be decoded or lacked required fields.
    #[error("unexpected response format: {0}")]
    SourceFormat(String),
}

impl AdapterError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidIdentifier(_))
    }

    /// Short machine-readable kind, stored as the job's last error prefix.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::SourceFormat(_) => "source_format",
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::SourceFormat(err.to_string())
        } else {
            Self::SourceUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        Self::SourceFormat(err.to_string())
    }
}
