//! The LLM backend abstraction.
//!
//! A [`Provider`] turns a message list into a reply and text into
//! embedding vectors. Implementations live in `threadloom-providers`;
//! everything here is backend-agnostic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::InputMessage;

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini", "anthropic/claude-sonnet-4")
    pub model: String,

    /// The conversation messages, oldest first
    pub messages: Vec<InputMessage>,

    /// Sampling temperature, 0.0 deterministic to 2.0 wild
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Cap on generated tokens; provider default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A request with default sampling settings.
    pub fn new(model: impl Into<String>, messages: Vec<InputMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: InputMessage,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// The model that actually answered, as the backend reports it
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The model to use for embeddings (e.g., "text-embedding-3-small")
    pub model: String,

    /// The texts to embed
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used
    pub model: String,

    /// Token usage
    pub usage: Option<Usage>,
}

/// An LLM backend.
///
/// The agent holds one as `Arc<dyn Provider>` and never learns which
/// endpoint is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Run one completion round trip.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Embed the given texts, one vector per input.
    ///
    /// Backends without an embedding endpoint keep the default, which
    /// reports the capability as not configured.
    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }

    /// Cheap reachability probe.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_are_conservative() {
        let req = ProviderRequest::new("gpt-4o-mini", vec![InputMessage::user("hi")]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
        assert!(req.stop.is_empty());
    }

    struct NoEmbeddings;

    #[async_trait]
    impl Provider for NoEmbeddings {
        fn name(&self) -> &str {
            "no-embeddings"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("test".into()))
        }
    }

    #[tokio::test]
    async fn embed_unsupported_by_default() {
        let provider = NoEmbeddings;
        let err = provider
            .embed(EmbeddingRequest {
                model: "m".into(),
                inputs: vec!["text".into()],
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not support embeddings"));
    }
}
