//! Adapts a provider's embeddings endpoint to the [`QueryEmbedder`] seam.

use std::sync::Arc;

use async_trait::async_trait;

use threadloom_core::error::EmbeddingError;
use threadloom_core::provider::{EmbeddingRequest, Provider};
use threadloom_core::{QueryEmbedder, QueryEmbedding};

/// A [`QueryEmbedder`] backed by one provider and one embedding model.
///
/// An optional score threshold rides along with every embedding it
/// produces; searchers treat it as the model's similarity floor, overriding
/// per-request thresholds.
pub struct ModelEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    score_threshold: Option<f32>,
}

impl ModelEmbedder {
    /// Embed queries with the given provider and model.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            score_threshold: None,
        }
    }

    /// Attach a similarity floor to every embedding this embedder produces.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl QueryEmbedder for ModelEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_query(
        &self,
        text: &str,
    ) -> std::result::Result<QueryEmbedding, EmbeddingError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await?;

        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Failed("Provider returned no embedding vectors".into()))?;

        Ok(QueryEmbedding {
            vector,
            model: response.model,
            score_threshold: self.score_threshold,
        })
    }
}
