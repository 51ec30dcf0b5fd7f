use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Failure of a single embedding call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("{provider}: {message}")]
    Request { provider: String, message: String },

    #[error("{provider}: expected {expected} dimensions, got {actual}")]
    Dimension {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("{provider}: timed out after {timeout_ms} ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("{provider}: {message}")]
    Config { provider: String, message: String },
}

impl EmbeddingError {
    pub fn provider(&self) -> &str {
        match self {
            EmbeddingError::Request { provider, .. }
            | EmbeddingError::Dimension { provider, .. }
            | EmbeddingError::Timeout { provider, .. }
            | EmbeddingError::Config { provider, .. } => provider,
        }
    }

    /// Timeouts and transport errors may succeed on a second try; a wrong
    /// vector size or a bad config will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Request { .. } | EmbeddingError::Timeout { .. })
    }
}

impl From<EmbeddingError> for dishx_core::Error {
    fn from(e: EmbeddingError) -> Self {
        dishx_core::Error::Embedding {
            provider: e.provider().to_string(),
            message: e.to_string(),
        }
    }
}
