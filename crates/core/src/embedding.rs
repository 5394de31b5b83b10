//! Query embedding — the seam between context assembly and vector search.
//!
//! The assembler never talks to an embedding model directly. When vector
//! search is requested it asks a [`QueryEmbedder`] for the query vector and
//! forwards the result to the searcher. No embedder wired means vector
//! search fails fast, before any network call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

/// An embedded search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEmbedding {
    /// The embedding vector
    pub vector: Vec<f32>,

    /// Which model produced it
    pub model: String,

    /// Model-specific similarity floor. When set, it overrides whatever
    /// threshold the caller configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

/// Turns query text into an embedding vector.
///
/// Implementations typically wrap a provider's embeddings endpoint.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// The embedding model name, for provenance.
    fn model(&self) -> &str;

    /// Embed one query string.
    async fn embed_query(
        &self,
        text: &str,
    ) -> std::result::Result<QueryEmbedding, EmbeddingError>;
}
