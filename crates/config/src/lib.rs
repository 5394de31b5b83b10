//! Configuration loading, validation, and management for Threadloom.
//!
//! Loads configuration from `threadloom.toml` (path overridable via the
//! `THREADLOOM_CONFIG` environment variable) with environment variable
//! overrides for secrets. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use threadloom_context::{
    ContextOptions, DEFAULT_MESSAGE_RANGE, DEFAULT_RECENT_MESSAGES, DEFAULT_SEARCH_LIMIT,
    MessageRange, SearchOptions,
};

/// The root configuration structure.
///
/// Maps directly to `threadloom.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM backend configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent identity and sampling settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Context assembly defaults
    #[serde(default)]
    pub context: ContextConfig,
}

/// Which LLM backend to talk to and with which credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend kind: "openai", "openrouter", or "ollama"
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Override the backend's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key; environment variables fill this in when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for completions
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for embeddings; "none" disables embeddings and with
    /// them vector search
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: None,
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name recorded on every message the agent saves
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// System instructions, prepended to every completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_agent_name() -> String {
    "assistant".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            instructions: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Flat, TOML-friendly mirror of [`ContextOptions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Recent thread messages per assembly; 0 means search-only
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,

    /// Leave tool calls and tool results out of recent history
    #[serde(default)]
    pub exclude_tool_messages: bool,

    /// Keyword search over message text
    #[serde(default)]
    pub text_search: bool,

    /// Semantic search over message embeddings
    #[serde(default)]
    pub vector_search: bool,

    /// Maximum search hits
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Neighbors included before each hit
    #[serde(default = "default_range_before")]
    pub message_range_before: usize,

    /// Neighbors included after each hit
    #[serde(default = "default_range_after")]
    pub message_range_after: usize,

    /// Similarity floor for vector hits; the embedder's own floor wins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score_threshold: Option<f32>,

    /// Search every thread the user owns, not just the current one
    #[serde(default)]
    pub search_other_threads: bool,
}

fn default_recent_messages() -> usize {
    DEFAULT_RECENT_MESSAGES
}
fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}
fn default_range_before() -> usize {
    DEFAULT_MESSAGE_RANGE.before
}
fn default_range_after() -> usize {
    DEFAULT_MESSAGE_RANGE.after
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_messages: default_recent_messages(),
            exclude_tool_messages: false,
            text_search: false,
            vector_search: false,
            search_limit: default_search_limit(),
            message_range_before: default_range_before(),
            message_range_after: default_range_after(),
            vector_score_threshold: None,
            search_other_threads: false,
        }
    }
}

impl ContextConfig {
    /// The equivalent [`ContextOptions`].
    pub fn to_options(&self) -> ContextOptions {
        let search_options = if self.text_search || self.vector_search {
            Some(SearchOptions {
                text_search: self.text_search,
                vector_search: self.vector_search,
                limit: Some(self.search_limit),
                message_range: Some(MessageRange {
                    before: self.message_range_before,
                    after: self.message_range_after,
                }),
                vector_score_threshold: self.vector_score_threshold,
            })
        } else {
            None
        };
        ContextOptions {
            recent_messages: Some(self.recent_messages),
            exclude_tool_messages: self.exclude_tool_messages,
            search_options,
            search_other_threads: self.search_other_threads,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path, or the one named by
    /// `THREADLOOM_CONFIG`.
    ///
    /// Environment variables fill in missing secrets and override models:
    /// - `THREADLOOM_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    /// - `THREADLOOM_MODEL` overrides `provider.chat_model`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("THREADLOOM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("threadloom.toml"));
        let mut config = Self::load_from(&path)?;

        // Environment fills secrets the file left out; the file wins.
        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("THREADLOOM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("THREADLOOM_MODEL") {
            config.provider.chat_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider.name.as_str() {
            "openai" | "openrouter" | "ollama" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "provider.name must be \"openai\", \"openrouter\", or \"ollama\", got \"{other}\""
                )));
            }
        }

        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.search_limit == 0 {
            return Err(ConfigError::ValidationError(
                "context.search_limit must be at least 1".into(),
            ));
        }

        if self.context.message_range_before > 100 || self.context.message_range_after > 100 {
            return Err(ConfigError::ValidationError(
                "context.message_range_before/after must be at most 100".into(),
            ));
        }

        if let Some(threshold) = self.context.vector_score_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::ValidationError(
                    "context.vector_score_threshold must be between -1.0 and 1.0".into(),
                ));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Whether an embedding model is configured.
    pub fn embeddings_enabled(&self) -> bool {
        let model = self.provider.embedding_model.as_str();
        !model.is_empty() && model != "none"
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
