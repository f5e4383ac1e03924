//! Error types for the PyCoach domain.
//!
//! Each bounded context has its own `thiserror` enum; callers wrap them in
//! their own request-level errors.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider (status: 429): {message}")]
    RateLimited { message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the backend reported a rate or quota limit.
    ///
    /// Decided from the HTTP status carried by the error, never from the
    /// message text.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status_code, .. } => *status_code == 429,
            _ => false,
        }
    }

    /// Whether the request never reached the backend.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Vector index not found at {0}")]
    IndexNotFound(String),

    #[error("Vector index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Reranking failed: {0}")]
    RerankFailed(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Document loading failed: {0}")]
    Documents(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),
}
