//! Store collaborator traits.
//!
//! The message backend is split into four narrow capabilities so callers can
//! wire exactly what they have: a query-only deployment implements
//! [`MessageFetcher`] and [`ThreadStore`] but may have no searcher at all.
//! [`MessageStore`] bundles all four for full-service backends.
//!
//! Implementations: in-memory (reference, in `threadloom-store`), or any
//! remote backend adapted to these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{InputMessage, Message, MessageStatus};
use crate::pagination::{MessagePage, PaginationOptions, SortOrder};
use crate::thread::{CreateThreadRequest, Thread};

/// Default window of surrounding messages returned with each search hit.
pub const DEFAULT_MESSAGE_RANGE: MessageRange = MessageRange {
    before: 2,
    after: 2,
};

/// How many neighboring messages to pull in around each search hit, so a
/// matched message arrives with enough of its exchange to make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRange {
    /// Messages before the hit
    pub before: usize,
    /// Messages after the hit
    pub after: usize,
}

impl Default for MessageRange {
    fn default() -> Self {
        DEFAULT_MESSAGE_RANGE
    }
}

/// Arguments for listing a page of thread messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMessagesRequest {
    /// The thread to list from
    pub thread_id: String,

    /// Page size and continuation cursor
    pub pagination: PaginationOptions,

    /// Walk direction over `(order, step_order)`
    #[serde(default)]
    pub order: SortOrder,

    /// Statuses to include. `None` means all statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<MessageStatus>>,

    /// Drop tool calls and tool results from the page
    #[serde(default)]
    pub exclude_tool_messages: bool,

    /// Only messages positioned at or before this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_to_and_including_message_id: Option<String>,
}

impl ListMessagesRequest {
    /// List the latest messages of a thread, newest first, all statuses.
    pub fn latest(thread_id: impl Into<String>, num_items: usize) -> Self {
        Self {
            thread_id: thread_id.into(),
            pagination: PaginationOptions::first(num_items),
            order: SortOrder::Desc,
            statuses: None,
            exclude_tool_messages: false,
            up_to_and_including_message_id: None,
        }
    }
}

/// Arguments for searching messages.
///
/// `search_all_messages_for_user_id` widens the candidate set to every
/// thread the user owns; otherwise only `thread_id` is searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMessagesRequest {
    /// Thread scope for the search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// When set, search across every thread owned by this user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_all_messages_for_user_id: Option<String>,

    /// Exclude hits positioned after this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_message_id: Option<String>,

    /// Maximum number of hits, before range expansion
    pub limit: usize,

    /// Neighboring messages to include with each hit
    #[serde(default)]
    pub message_range: MessageRange,

    /// The query text
    pub text: String,

    /// The query embedding, when vector search is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,

    /// Which model produced `vector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_model: Option<String>,

    /// Minimum similarity for vector hits
    #[serde(default)]
    pub vector_score_threshold: f32,
}

/// Arguments for saving a message to a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMessageRequest {
    /// The thread to append to
    pub thread_id: String,

    /// The user on whose behalf the message is saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// The message payload
    pub message: InputMessage,

    /// When set, the new message continues this prompt's turn: same
    /// `order`, next `step_order`. Otherwise a fresh turn begins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_message_id: Option<String>,

    /// Initial status
    #[serde(default = "default_save_status")]
    pub status: MessageStatus,

    /// Which agent produced the message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    /// Which model produced the message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Error detail for failed generations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Embedding of the text content, if the caller computed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn default_save_status() -> MessageStatus {
    MessageStatus::Success
}

impl SaveMessageRequest {
    /// Save a message with default status and no provenance.
    pub fn new(thread_id: impl Into<String>, message: InputMessage) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: None,
            message,
            prompt_message_id: None,
            status: MessageStatus::Success,
            agent_name: None,
            model: None,
            error: None,
            embedding: None,
        }
    }
}

/// Read access to a thread's message sequence.
#[async_trait]
pub trait MessageFetcher: Send + Sync {
    /// List one page of a thread's messages.
    async fn list_thread_messages(
        &self,
        request: ListMessagesRequest,
    ) -> std::result::Result<MessagePage, StoreError>;
}

/// Text and vector search over stored messages.
#[async_trait]
pub trait MessageSearcher: Send + Sync {
    /// Search for relevant messages, each hit expanded by the requested
    /// range. Results come back in relevance order; callers re-sort.
    async fn search_messages(
        &self,
        request: SearchMessagesRequest,
    ) -> std::result::Result<Vec<Message>, StoreError>;
}

/// Thread creation and lookup.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create a new thread.
    async fn create_thread(
        &self,
        request: CreateThreadRequest,
    ) -> std::result::Result<Thread, StoreError>;

    /// Look up a thread by ID.
    async fn get_thread(
        &self,
        thread_id: &str,
    ) -> std::result::Result<Option<Thread>, StoreError>;
}

/// Write access for new messages.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Persist a message, assigning its `(order, step_order)` position.
    async fn save_message(
        &self,
        request: SaveMessageRequest,
    ) -> std::result::Result<Message, StoreError>;
}

/// A full-service backend: everything the context pipeline needs.
///
/// Blanket-implemented for any type with all four capabilities. An
/// `Arc<dyn MessageStore>` upcasts to each narrow trait where needed.
pub trait MessageStore: MessageFetcher + MessageSearcher + ThreadStore + MessageWriter {}

impl<T: MessageFetcher + MessageSearcher + ThreadStore + MessageWriter> MessageStore for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_range_default() {
        let range = MessageRange::default();
        assert_eq!(range.before, 2);
        assert_eq!(range.after, 2);
    }

    #[test]
    fn list_request_deserializes_with_defaults() {
        let request: ListMessagesRequest = serde_json::from_str(
            r#"{"thread_id": "t1", "pagination": {"num_items": 50}}"#,
        )
        .unwrap();
        assert_eq!(request.order, SortOrder::Desc);
        assert!(request.statuses.is_none());
        assert!(!request.exclude_tool_messages);
    }

    #[test]
    fn save_request_defaults_to_success() {
        let request = SaveMessageRequest::new("t1", InputMessage::user("hello"));
        assert_eq!(request.status, MessageStatus::Success);
        assert!(request.prompt_message_id.is_none());
    }
}
