//! In-memory reference implementation of the message store traits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use threadloom_core::error::StoreError;
use threadloom_core::{
    CreateThreadRequest, DomainEvent, EventBus, ListMessagesRequest, Message, MessageFetcher,
    MessagePage, MessageSearcher, MessageStatus, MessageWriter, SaveMessageRequest,
    SearchMessagesRequest, SortOrder, Thread, ThreadStore,
};

use crate::search;

/// An in-memory message store.
///
/// Threads and messages live in vectors behind a [`tokio::sync::RwLock`];
/// queries take a read lock, writes take the write lock. Positions are
/// assigned at save time: a fresh message starts the next turn at
/// `(max order + 1, 0)`, while a message saved against a prompt continues
/// that prompt's turn at the next step.
///
/// Cursors are plain offsets into the filtered listing, encoded as strings.
/// They are opaque to callers and only valid against this store instance.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    events: Option<Arc<EventBus>>,
}

#[derive(Default)]
struct State {
    threads: Vec<Thread>,
    messages: Vec<Message>,
}

/// Resolved position of a search bound.
///
/// Hits in the bound's own thread compare by `(order, step_order)`; hits in
/// other threads compare by creation time, since positions are only
/// comparable within one thread.
struct SearchBound {
    thread_id: Option<String>,
    key: (i64, i64),
    created_at: DateTime<Utc>,
}

impl SearchBound {
    fn admits(&self, message: &Message) -> bool {
        if message.thread_id == self.thread_id {
            message.key() <= self.key
        } else {
            message.created_at <= self.created_at
        }
    }
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            events: None,
        }
    }

    /// Publish [`DomainEvent`]s to the given bus on thread creation and
    /// message saves.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[cfg(test)]
    async fn seed(&self, message: Message) {
        self.state.write().await.messages.push(message);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageFetcher for InMemoryStore {
    async fn list_thread_messages(
        &self,
        request: ListMessagesRequest,
    ) -> std::result::Result<MessagePage, StoreError> {
        let state = self.state.read().await;

        // The bound message must exist in the listed thread.
        let bound = match &request.up_to_and_including_message_id {
            Some(id) => Some(
                state
                    .messages
                    .iter()
                    .find(|m| {
                        &m.id == id
                            && m.thread_id.as_deref() == Some(request.thread_id.as_str())
                    })
                    .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?
                    .key(),
            ),
            None => None,
        };

        let mut items: Vec<&Message> = state
            .messages
            .iter()
            .filter(|m| m.thread_id.as_deref() == Some(request.thread_id.as_str()))
            .filter(|m| match &request.statuses {
                Some(statuses) => statuses.contains(&m.status),
                None => true,
            })
            .filter(|m| !request.exclude_tool_messages || !m.is_tool_message())
            .filter(|m| bound.is_none_or(|b| m.key() <= b))
            .collect();
        items.sort_by_key(|m| m.key());
        if request.order == SortOrder::Desc {
            items.reverse();
        }

        let offset = match request.pagination.cursor.as_deref() {
            Some(cursor) if !cursor.is_empty() => cursor
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidCursor(cursor.to_string()))?,
            _ => 0,
        };

        let total = items.len();
        let page: Vec<Message> = items
            .into_iter()
            .skip(offset)
            .take(request.pagination.num_items)
            .cloned()
            .collect();
        let next = offset + page.len();

        Ok(MessagePage {
            page,
            is_done: next >= total,
            continue_cursor: next.to_string(),
        })
    }
}

#[async_trait]
impl MessageSearcher for InMemoryStore {
    async fn search_messages(
        &self,
        request: SearchMessagesRequest,
    ) -> std::result::Result<Vec<Message>, StoreError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;

        let bound = match &request.before_message_id {
            Some(id) => {
                let message = state
                    .messages
                    .iter()
                    .find(|m| &m.id == id)
                    .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;
                Some(SearchBound {
                    thread_id: message.thread_id.clone(),
                    key: message.key(),
                    created_at: message.created_at,
                })
            }
            None => None,
        };

        // Candidate scope: one thread, or every thread the user owns. Only
        // finalized messages are searchable.
        let candidates: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Success)
            .filter(
                |m| match (&request.search_all_messages_for_user_id, &request.thread_id) {
                    (Some(user_id), _) => m.user_id.as_deref() == Some(user_id.as_str()),
                    (None, Some(thread_id)) => m.thread_id.as_deref() == Some(thread_id.as_str()),
                    (None, None) => false,
                },
            )
            .filter(|m| bound.as_ref().is_none_or(|b| b.admits(m)))
            .cloned()
            .collect();

        let hits = search::rank_hits(&candidates, &request);
        debug!(
            candidates = candidates.len(),
            hits = hits.len(),
            vector = request.vector.is_some(),
            "ranked search hits"
        );

        // Windows expand within the same candidate set, so the bound and
        // status filters also apply to a hit's neighbors.
        let mut sequences: HashMap<String, Vec<Message>> = HashMap::new();
        for message in &candidates {
            if let Some(thread_id) = &message.thread_id {
                sequences
                    .entry(thread_id.clone())
                    .or_default()
                    .push(message.clone());
            }
        }
        for sequence in sequences.values_mut() {
            sequence.sort_by_key(Message::key);
        }

        Ok(search::expand_hits(&hits, request.message_range, &sequences))
    }
}

#[async_trait]
impl ThreadStore for InMemoryStore {
    async fn create_thread(
        &self,
        request: CreateThreadRequest,
    ) -> std::result::Result<Thread, StoreError> {
        let thread = Thread::new(request);
        self.state.write().await.threads.push(thread.clone());
        debug!(thread_id = %thread.id, "thread created");

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ThreadCreated {
                thread_id: thread.id.clone(),
                user_id: thread.user_id.clone(),
                timestamp: Utc::now(),
            });
        }
        Ok(thread)
    }

    async fn get_thread(
        &self,
        thread_id: &str,
    ) -> std::result::Result<Option<Thread>, StoreError> {
        let state = self.state.read().await;
        Ok(state.threads.iter().find(|t| t.id == thread_id).cloned())
    }
}

#[async_trait]
impl MessageWriter for InMemoryStore {
    async fn save_message(
        &self,
        request: SaveMessageRequest,
    ) -> std::result::Result<Message, StoreError> {
        let mut state = self.state.write().await;

        let thread_user = state
            .threads
            .iter()
            .find(|t| t.id == request.thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(request.thread_id.clone()))?
            .user_id
            .clone();

        let (order, step_order) = match &request.prompt_message_id {
            Some(prompt_id) => {
                let prompt = state
                    .messages
                    .iter()
                    .find(|m| {
                        &m.id == prompt_id
                            && m.thread_id.as_deref() == Some(request.thread_id.as_str())
                    })
                    .ok_or_else(|| StoreError::MessageNotFound(prompt_id.clone()))?;
                let last_step = state
                    .messages
                    .iter()
                    .filter(|m| {
                        m.thread_id.as_deref() == Some(request.thread_id.as_str())
                            && m.order == prompt.order
                    })
                    .map(|m| m.step_order)
                    .max()
                    .unwrap_or(prompt.step_order);
                (prompt.order, last_step + 1)
            }
            None => {
                let next_order = state
                    .messages
                    .iter()
                    .filter(|m| m.thread_id.as_deref() == Some(request.thread_id.as_str()))
                    .map(|m| m.order)
                    .max()
                    .map_or(0, |order| order + 1);
                (next_order, 0)
            }
        };

        let mut message = Message::at(order, step_order, request.message.role, request.message.content)
            .with_thread(&request.thread_id)
            .with_status(request.status);
        message.user_id = request.user_id.or(thread_user);
        message.agent_name = request.agent_name;
        message.model = request.model;
        message.error = request.error;
        message.embedding = request.embedding;

        state.messages.push(message.clone());
        drop(state);

        debug!(
            thread_id = %request.thread_id,
            order,
            step_order,
            role = ?message.role,
            "message saved"
        );

        if let Some(events) = &self.events {
            events.publish(DomainEvent::MessageSaved {
                thread_id: request.thread_id.clone(),
                message_id: message.id.clone(),
                role: message.role,
                order: message.order,
                step_order: message.step_order,
                timestamp: Utc::now(),
            });
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadloom_core::{
        ContentPart, InputMessage, MessageRange, PaginationOptions, Role,
    };

    async fn store_with_thread() -> (InMemoryStore, Thread) {
        let store = InMemoryStore::new();
        let thread = store
            .create_thread(CreateThreadRequest::for_user("user_1"))
            .await
            .unwrap();
        (store, thread)
    }

    async fn save_text(store: &InMemoryStore, thread_id: &str, role: Role, text: &str) -> Message {
        let message = InputMessage {
            role,
            content: text.into(),
        };
        store
            .save_message(SaveMessageRequest::new(thread_id, message))
            .await
            .unwrap()
    }

    fn search_request(thread_id: &str, text: &str) -> SearchMessagesRequest {
        SearchMessagesRequest {
            thread_id: Some(thread_id.to_string()),
            search_all_messages_for_user_id: None,
            before_message_id: None,
            limit: 10,
            message_range: MessageRange::default(),
            text: text.to_string(),
            vector: None,
            vector_model: None,
            vector_score_threshold: 0.0,
        }
    }

    #[tokio::test]
    async fn saving_assigns_sequential_turn_positions() {
        let (store, thread) = store_with_thread().await;
        let first = save_text(&store, &thread.id, Role::User, "one").await;
        let second = save_text(&store, &thread.id, Role::Assistant, "two").await;
        let third = save_text(&store, &thread.id, Role::User, "three").await;

        assert_eq!(first.key(), (0, 0));
        assert_eq!(second.key(), (1, 0));
        assert_eq!(third.key(), (2, 0));
    }

    #[tokio::test]
    async fn prompt_continuation_shares_the_turn() {
        let (store, thread) = store_with_thread().await;
        let prompt = save_text(&store, &thread.id, Role::User, "prompt").await;

        let mut request =
            SaveMessageRequest::new(&thread.id, InputMessage::assistant("step one"));
        request.prompt_message_id = Some(prompt.id.clone());
        let step_one = store.save_message(request).await.unwrap();

        let mut request =
            SaveMessageRequest::new(&thread.id, InputMessage::assistant("step two"));
        request.prompt_message_id = Some(prompt.id.clone());
        let step_two = store.save_message(request).await.unwrap();

        assert_eq!(step_one.key(), (0, 1));
        assert_eq!(step_two.key(), (0, 2));
    }

    #[tokio::test]
    async fn unknown_prompt_message_is_an_error() {
        let (store, thread) = store_with_thread().await;
        let mut request = SaveMessageRequest::new(&thread.id, InputMessage::assistant("reply"));
        request.prompt_message_id = Some("m_missing".to_string());

        let err = store.save_message(request).await.unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound(id) if id == "m_missing"));
    }

    #[tokio::test]
    async fn saving_to_a_missing_thread_is_an_error() {
        let store = InMemoryStore::new();
        let request = SaveMessageRequest::new("t_missing", InputMessage::user("hello"));

        let err = store.save_message(request).await.unwrap_err();
        assert!(matches!(err, StoreError::ThreadNotFound(id) if id == "t_missing"));
    }

    #[tokio::test]
    async fn saved_messages_inherit_the_thread_owner() {
        let (store, thread) = store_with_thread().await;
        let message = save_text(&store, &thread.id, Role::User, "hello").await;
        assert_eq!(message.user_id.as_deref(), Some("user_1"));
    }

    #[tokio::test]
    async fn listing_pages_walk_newest_first() {
        let (store, thread) = store_with_thread().await;
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(save_text(&store, &thread.id, Role::User, &format!("m{i}")).await.id);
        }

        let mut request = ListMessagesRequest::latest(&thread.id, 2);
        let first = store.list_thread_messages(request.clone()).await.unwrap();
        assert_eq!(
            first.page.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            [ids[4].as_str(), ids[3].as_str()],
        );
        assert!(!first.is_done);

        request.pagination = PaginationOptions {
            num_items: 2,
            cursor: Some(first.continue_cursor),
        };
        let second = store.list_thread_messages(request.clone()).await.unwrap();
        assert_eq!(
            second.page.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            [ids[2].as_str(), ids[1].as_str()],
        );
        assert!(!second.is_done);

        request.pagination = PaginationOptions {
            num_items: 2,
            cursor: Some(second.continue_cursor),
        };
        let last = store.list_thread_messages(request).await.unwrap();
        assert_eq!(last.page.len(), 1);
        assert_eq!(last.page[0].id, ids[0]);
        assert!(last.is_done);
    }

    #[tokio::test]
    async fn listing_filters_by_status() {
        let (store, thread) = store_with_thread().await;
        save_text(&store, &thread.id, Role::User, "good").await;

        let mut failed = SaveMessageRequest::new(&thread.id, InputMessage::assistant(""));
        failed.status = MessageStatus::Failed;
        failed.error = Some("provider exploded".to_string());
        store.save_message(failed).await.unwrap();

        let mut request = ListMessagesRequest::latest(&thread.id, 10);
        request.order = SortOrder::Asc;
        request.statuses = Some(vec![MessageStatus::Success]);
        let page = store.list_thread_messages(request).await.unwrap();

        assert_eq!(page.page.len(), 1);
        assert_eq!(page.page[0].text().as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn listing_can_exclude_tool_messages() {
        let (store, thread) = store_with_thread().await;
        save_text(&store, &thread.id, Role::User, "what is 2+2?").await;

        let call = InputMessage {
            role: Role::Assistant,
            content: vec![ContentPart::ToolCall {
                tool_call_id: "call_1".into(),
                tool_name: "calc".into(),
                arguments: serde_json::json!({"expr": "2+2"}),
            }]
            .into(),
        };
        store
            .save_message(SaveMessageRequest::new(&thread.id, call))
            .await
            .unwrap();

        let result = InputMessage {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult {
                tool_call_id: "call_1".into(),
                tool_name: "calc".into(),
                output: serde_json::json!(4),
            }]
            .into(),
        };
        store
            .save_message(SaveMessageRequest::new(&thread.id, result))
            .await
            .unwrap();

        save_text(&store, &thread.id, Role::Assistant, "4").await;

        let mut request = ListMessagesRequest::latest(&thread.id, 10);
        request.order = SortOrder::Asc;
        request.exclude_tool_messages = true;
        let page = store.list_thread_messages(request).await.unwrap();

        let texts: Vec<_> = page.page.iter().filter_map(|m| m.text()).collect();
        assert_eq!(texts, ["what is 2+2?", "4"]);
    }

    #[tokio::test]
    async fn bound_listing_stops_at_the_bound() {
        let (store, thread) = store_with_thread().await;
        let mut saved = Vec::new();
        for i in 0..4 {
            saved.push(save_text(&store, &thread.id, Role::User, &format!("m{i}")).await);
        }

        let mut request = ListMessagesRequest::latest(&thread.id, 10);
        request.order = SortOrder::Asc;
        request.up_to_and_including_message_id = Some(saved[2].id.clone());
        let page = store.list_thread_messages(request).await.unwrap();

        assert_eq!(page.page.len(), 3);
        assert_eq!(page.page.last().unwrap().id, saved[2].id);
    }

    #[tokio::test]
    async fn unknown_bound_is_an_error() {
        let (store, thread) = store_with_thread().await;
        let mut request = ListMessagesRequest::latest(&thread.id, 10);
        request.up_to_and_including_message_id = Some("m_missing".to_string());

        let err = store.list_thread_messages(request).await.unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound(_)));
    }

    #[tokio::test]
    async fn malformed_cursor_is_rejected() {
        let (store, thread) = store_with_thread().await;
        save_text(&store, &thread.id, Role::User, "hello").await;

        let mut request = ListMessagesRequest::latest(&thread.id, 10);
        request.pagination = PaginationOptions {
            num_items: 10,
            cursor: Some("not-a-number".to_string()),
        };
        let err = store.list_thread_messages(request).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn keyword_search_expands_hits_with_neighbors() {
        let (store, thread) = store_with_thread().await;
        save_text(&store, &thread.id, Role::User, "how do I deploy this?").await;
        save_text(&store, &thread.id, Role::Assistant, "push to main and CI handles it").await;
        save_text(&store, &thread.id, Role::User, "unrelated question about lunch").await;

        let mut request = search_request(&thread.id, "deploy");
        request.message_range = MessageRange {
            before: 0,
            after: 1,
        };
        let hits = store.search_messages(request).await.unwrap();

        let texts: Vec<_> = hits.iter().filter_map(|m| m.text()).collect();
        assert_eq!(
            texts,
            ["how do I deploy this?", "push to main and CI handles it"],
        );
    }

    #[tokio::test]
    async fn search_scopes_to_the_requested_thread() {
        let store = InMemoryStore::new();
        let home = store
            .create_thread(CreateThreadRequest::for_user("user_1"))
            .await
            .unwrap();
        let other = store
            .create_thread(CreateThreadRequest::for_user("user_1"))
            .await
            .unwrap();
        save_text(&store, &home.id, Role::User, "rust borrow checker").await;
        save_text(&store, &other.id, Role::User, "rust lifetimes").await;

        let hits = store
            .search_messages(search_request(&home.id, "rust"))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].thread_id.as_deref(), Some(home.id.as_str()));
    }

    #[tokio::test]
    async fn user_scope_searches_across_threads() {
        let store = InMemoryStore::new();
        let home = store
            .create_thread(CreateThreadRequest::for_user("user_1"))
            .await
            .unwrap();
        let other = store
            .create_thread(CreateThreadRequest::for_user("user_1"))
            .await
            .unwrap();
        let stranger = store
            .create_thread(CreateThreadRequest::for_user("user_2"))
            .await
            .unwrap();
        save_text(&store, &home.id, Role::User, "rust borrow checker").await;
        save_text(&store, &other.id, Role::User, "rust lifetimes").await;
        save_text(&store, &stranger.id, Role::User, "rust macros").await;

        let mut request = search_request(&home.id, "rust");
        request.search_all_messages_for_user_id = Some("user_1".to_string());
        let hits = store.search_messages(request).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|m| m.user_id.as_deref() == Some("user_1")));
    }

    #[tokio::test]
    async fn search_bound_excludes_later_messages() {
        let (store, thread) = store_with_thread().await;
        let early = save_text(&store, &thread.id, Role::User, "rust question").await;
        save_text(&store, &thread.id, Role::Assistant, "an answer").await;
        let bound = save_text(&store, &thread.id, Role::User, "checkpoint").await;
        save_text(&store, &thread.id, Role::User, "rust again, later").await;

        let mut request = search_request(&thread.id, "rust");
        request.before_message_id = Some(bound.id.clone());
        let hits = store.search_messages(request).await.unwrap();

        assert!(hits.iter().any(|m| m.id == early.id));
        assert!(hits.iter().all(|m| m.key() <= bound.key()));
    }

    #[tokio::test]
    async fn cross_thread_bound_compares_creation_time() {
        let store = InMemoryStore::new();
        let base = Utc::now();

        let mut old_hit = Message::at(0, 0, Role::User, "deploy checklist")
            .with_thread("t_other")
            .with_user("user_1");
        old_hit.created_at = base - chrono::Duration::minutes(10);

        let mut bound = Message::at(0, 0, Role::User, "checkpoint")
            .with_thread("t_home")
            .with_user("user_1");
        bound.created_at = base - chrono::Duration::minutes(5);

        let mut late_hit = Message::at(1, 0, Role::User, "deploy checklist")
            .with_thread("t_other")
            .with_user("user_1");
        late_hit.created_at = base;

        store.seed(old_hit.clone()).await;
        store.seed(bound.clone()).await;
        store.seed(late_hit.clone()).await;

        let mut request = search_request("t_home", "deploy");
        request.search_all_messages_for_user_id = Some("user_1".to_string());
        request.before_message_id = Some(bound.id.clone());
        let hits = store.search_messages(request).await.unwrap();

        assert!(hits.iter().any(|m| m.id == old_hit.id));
        assert!(hits.iter().all(|m| m.id != late_hit.id));
    }

    #[tokio::test]
    async fn vector_search_uses_stored_embeddings() {
        let (store, thread) = store_with_thread().await;

        let mut close = SaveMessageRequest::new(&thread.id, InputMessage::user("alpha"));
        close.embedding = Some(vec![1.0, 0.0]);
        store.save_message(close).await.unwrap();

        let mut far = SaveMessageRequest::new(&thread.id, InputMessage::user("beta"));
        far.embedding = Some(vec![0.0, 1.0]);
        store.save_message(far).await.unwrap();

        let mut request = search_request(&thread.id, "zzz");
        request.vector = Some(vec![1.0, 0.0]);
        request.vector_score_threshold = 0.5;
        request.message_range = MessageRange {
            before: 0,
            after: 0,
        };
        let hits = store.search_messages(request).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text().as_deref(), Some("alpha"));
    }

    #[tokio::test]
    async fn pending_messages_never_match() {
        let (store, thread) = store_with_thread().await;
        let mut pending = SaveMessageRequest::new(&thread.id, InputMessage::user("rust draft"));
        pending.status = MessageStatus::Pending;
        store.save_message(pending).await.unwrap();

        let hits = store
            .search_messages(search_request(&thread.id, "rust"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn events_fire_on_create_and_save() {
        let events = Arc::new(EventBus::new(16));
        let store = InMemoryStore::new().with_events(events.clone());
        let mut rx = events.subscribe();

        let thread = store
            .create_thread(CreateThreadRequest::for_user("user_1"))
            .await
            .unwrap();
        save_text(&store, &thread.id, Role::User, "hello").await;

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ThreadCreated { thread_id, .. } => assert_eq!(thread_id, &thread.id),
            other => panic!("expected ThreadCreated, got {other:?}"),
        }
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::MessageSaved {
                thread_id, order, ..
            } => {
                assert_eq!(thread_id, &thread.id);
                assert_eq!(*order, 0);
            }
            other => panic!("expected MessageSaved, got {other:?}"),
        }
    }
}
