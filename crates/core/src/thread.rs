//! Thread domain types.
//!
//! A thread groups the messages of one ongoing conversation. Threads may
//! belong to a user; user-scoped search walks every thread the user owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    /// Accepting new messages
    #[default]
    Active,
    /// Read-only; excluded from default listings
    Archived,
}

/// A conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Unique thread ID
    pub id: String,

    /// The user who owns this thread, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Optional title (user-set or generated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Optional running summary of the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: ThreadStatus,

    /// When this thread was created
    pub created_at: DateTime<Utc>,
}

impl Thread {
    /// Create a fresh active thread from creation arguments.
    pub fn new(request: CreateThreadRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            title: request.title,
            summary: request.summary,
            status: ThreadStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// Arguments for creating a thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateThreadRequest {
    /// Owner of the new thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Initial title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Initial summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl CreateThreadRequest {
    /// A thread owned by the given user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_thread_is_active() {
        let thread = Thread::new(CreateThreadRequest::for_user("user_1"));
        assert_eq!(thread.status, ThreadStatus::Active);
        assert_eq!(thread.user_id.as_deref(), Some("user_1"));
        assert!(!thread.id.is_empty());
    }

    #[test]
    fn thread_serialization_skips_empty_fields() {
        let thread = Thread::new(CreateThreadRequest::default());
        let json = serde_json::to_string(&thread).unwrap();
        assert!(!json.contains("user_id"));
        assert!(!json.contains("title"));
    }
}
