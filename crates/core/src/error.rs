//! Error types for the Threadloom domain.
//!
//! Each bounded context gets its own `thiserror` enum; the top-level
//! [`Error`] aggregates them through `#[from]` so callers can hold one
//! type at the edges and match on the specifics where it matters.

use thiserror::Error;

/// The top-level error type for all Threadloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Context assembly errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Shorthand for fallible operations at the crate edge.
pub type Result<T> = std::result::Result<T, Error>;

// --- Per-context errors ---

/// Failures while assembling context for a prompt.
///
/// The first four variants are caller mistakes and are raised before any
/// store or network call is made. The rest wrap collaborator failures,
/// propagated unchanged.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Specify a user or a thread to assemble context for")]
    InvalidScope,

    #[error("Search requested but no searcher is configured for this context")]
    SearchUnavailable,

    #[error("Vector search requested but no query embedder is configured")]
    MissingEmbedder,

    #[error("No text to search: {0}")]
    NoSearchableText(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Failures from a message store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failures from an LLM provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures while producing query embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Embedding failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_error_displays_correctly() {
        let err = Error::Context(ContextError::MissingEmbedder);
        assert!(err.to_string().contains("no query embedder"));

        let err = Error::Context(ContextError::InvalidScope);
        assert!(err.to_string().contains("user or a thread"));
    }

    #[test]
    fn store_error_propagates_through_context() {
        let store_err = StoreError::ThreadNotFound("t_missing".into());
        let err: ContextError = store_err.into();
        assert!(err.to_string().contains("t_missing"));
    }

    #[test]
    fn api_error_display_carries_status_and_body() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }
}
