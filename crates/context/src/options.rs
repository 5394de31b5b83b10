//! Context options: how much history to fetch and how to search.
//!
//! Defaults live here as named constants so callers and config files can
//! reference them instead of re-inventing magic numbers.

use serde::{Deserialize, Serialize};

pub use threadloom_core::store::{DEFAULT_MESSAGE_RANGE, MessageRange};

/// How many recent messages are fetched when the caller doesn't say.
pub const DEFAULT_RECENT_MESSAGES: usize = 100;

/// Maximum search hits when the caller doesn't say.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Similarity floor for vector hits when neither the caller nor the
/// embedder supplies one.
pub const DEFAULT_VECTOR_SCORE_THRESHOLD: f32 = 0.0;

/// Controls what goes into an assembled context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    /// How many recent thread messages to include. `None` means the
    /// default of [`DEFAULT_RECENT_MESSAGES`]; `Some(0)` disables recent
    /// history entirely (search-only mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_messages: Option<usize>,

    /// Leave tool calls and tool results out of the recent history.
    #[serde(default)]
    pub exclude_tool_messages: bool,

    /// Search configuration. `None` disables search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_options: Option<SearchOptions>,

    /// Widen search to every thread the user owns, not just this one.
    #[serde(default)]
    pub search_other_threads: bool,
}

/// Controls the search half of context assembly.
///
/// Text and vector search are independent toggles; either one activates
/// the search path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Keyword search over message text.
    #[serde(default)]
    pub text_search: bool,

    /// Semantic search over message embeddings. Requires an embedder.
    #[serde(default)]
    pub vector_search: bool,

    /// Maximum hits. `None` means [`DEFAULT_SEARCH_LIMIT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Neighbors to include around each hit. `None` means
    /// [`DEFAULT_MESSAGE_RANGE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_range: Option<MessageRange>,

    /// Similarity floor for vector hits. `None` means
    /// [`DEFAULT_VECTOR_SCORE_THRESHOLD`], unless the embedder dictates
    /// its own floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score_threshold: Option<f32>,
}

impl SearchOptions {
    /// Whether any search mode is requested.
    pub fn enabled(&self) -> bool {
        self.text_search || self.vector_search
    }

    /// Text-only search with default limits.
    pub fn text() -> Self {
        Self {
            text_search: true,
            ..Self::default()
        }
    }

    /// Text plus vector search with default limits.
    pub fn hybrid() -> Self {
        Self {
            text_search: true,
            vector_search: true,
            ..Self::default()
        }
    }
}
