//! Message domain types.
//!
//! A message is one step of a thread: a user prompt, an assistant reply, a
//! tool call or its result. Every stored message carries a composite
//! `(order, step_order)` position — `order` advances once per logical turn,
//! `step_order` advances within a turn as the agent works through tool
//! calls — and the whole system sorts by that pair, never by wall-clock time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// Lifecycle status of a stored message.
///
/// Context assembly only trusts `Success`: in-flight generations and failed
/// ones never feed back into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Still being generated or awaiting tool results
    Pending,
    /// Finalized and usable as context
    Success,
    /// Generation failed; kept for diagnostics only
    Failed,
}

/// Message content: plain text, or a sequence of typed parts.
///
/// Serializes untagged so plain text stays a bare JSON string on the wire
/// and multi-part content is an array of `{"type": ...}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multi-part content (text, tool calls, tool results, images)
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// A text fragment
    Text { text: String },

    /// A tool invocation requested by the assistant
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },

    /// The result of a tool invocation
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        output: serde_json::Value,
    },

    /// An image reference
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

impl MessageContent {
    /// Plain text content.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Multi-part content.
    pub fn from_parts(parts: impl Into<Vec<ContentPart>>) -> Self {
        Self::Parts(parts.into())
    }

    /// The typed parts, or an empty slice for plain text.
    pub fn parts(&self) -> &[ContentPart] {
        match self {
            Self::Text(_) => &[],
            Self::Parts(parts) => parts,
        }
    }

    /// Extract the searchable text of this content, if any.
    ///
    /// Text parts are joined with newlines. Returns `None` when the content
    /// has no text or only empty text — tool calls and images carry none.
    pub fn text(&self) -> Option<String> {
        let text = match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };
        if text.is_empty() { None } else { Some(text) }
    }

    /// IDs of the tool calls this content requests.
    pub fn tool_call_ids(&self) -> impl Iterator<Item = &str> {
        self.parts().iter().filter_map(|part| match part {
            ContentPart::ToolCall { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }

    /// IDs referenced by the tool results in this content.
    pub fn tool_result_ids(&self) -> impl Iterator<Item = &str> {
        self.parts().iter().filter_map(|part| match part {
            ContentPart::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

/// A single stored message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// The thread this message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// The user on whose behalf this message exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Logical turn number within the thread
    pub order: i64,

    /// Step within the turn (prompt, tool calls, final reply)
    pub step_order: i64,

    /// Lifecycle status
    pub status: MessageStatus,

    /// Who authored this message
    pub role: Role,

    /// The content
    pub content: MessageContent,

    /// Which agent produced this message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    /// Which model produced this message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Error detail for failed generations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When this message was stored
    pub created_at: DateTime<Utc>,

    /// Embedding of the text content, populated at save time when an
    /// embedder is configured
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Message {
    /// Create a success-status message at the given position.
    ///
    /// Stores assign positions themselves at save time; this is the manual
    /// path, used by backends and tests.
    pub fn at(order: i64, step_order: i64, role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: None,
            user_id: None,
            order,
            step_order,
            status: MessageStatus::Success,
            role,
            content: content.into(),
            agent_name: None,
            model: None,
            error: None,
            created_at: Utc::now(),
            embedding: None,
        }
    }

    /// Attach this message to a thread.
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Attach this message to a user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Override the lifecycle status.
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach an embedding of the text content.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The composite ordering key. All context assembly sorts by this.
    pub fn key(&self) -> (i64, i64) {
        (self.order, self.step_order)
    }

    /// Extract the searchable text, if any.
    pub fn text(&self) -> Option<String> {
        self.content.text()
    }

    /// Whether this message is part of a tool-call flow: a tool result, or
    /// an assistant message that requests tool calls.
    pub fn is_tool_message(&self) -> bool {
        self.role == Role::Tool || self.content.tool_call_ids().next().is_some()
    }
}

/// An in-flight message that has not been saved yet: the prompt being sent,
/// or extra context supplied by the caller. Search derives its query text
/// from the last of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    /// Who authored this message
    pub role: Role,

    /// The content
    pub content: MessageContent,
}

impl InputMessage {
    /// Create a user text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create an assistant text message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Extract the searchable text, if any.
    pub fn text(&self) -> Option<String> {
        self.content.text()
    }
}

/// Stored messages replay through providers as plain role + content.
impl From<&Message> for InputMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}
