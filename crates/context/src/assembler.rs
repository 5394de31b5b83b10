//! The context assembler.
//!
//! One `assemble` call is one sequential flow: fetch recent history, then
//! (optionally) embed the query and search, then merge, sort, and scrub
//! locally. No locks, no retries, no partial results — collaborator errors
//! abort the whole assembly and propagate typed to the caller.

use std::collections::HashSet;
use std::sync::Arc;

use threadloom_core::embedding::QueryEmbedder;
use threadloom_core::error::ContextError;
use threadloom_core::message::{InputMessage, Message, MessageContent, MessageStatus};
use threadloom_core::pagination::{PaginationOptions, SortOrder};
use threadloom_core::store::{
    ListMessagesRequest, MessageFetcher, MessageSearcher, SearchMessagesRequest, ThreadStore,
};
use tracing::debug;

use crate::listing::list_messages;
use crate::options::{
    ContextOptions, DEFAULT_RECENT_MESSAGES, DEFAULT_SEARCH_LIMIT,
    DEFAULT_VECTOR_SCORE_THRESHOLD, SearchOptions,
};
use crate::orphan::filter_orphaned_tool_messages;

/// One context-assembly request: whose context, which thread, what is
/// about to be sent, and how much to gather.
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    /// The user whose context is being assembled
    pub user_id: Option<String>,

    /// The thread being continued
    pub thread_id: Option<String>,

    /// The in-flight messages about to be sent. Search derives its query
    /// text from the last of these when no bound message resolves.
    pub messages: Vec<InputMessage>,

    /// Assemble context as it stood at this message, inclusive. Used to
    /// regenerate or inspect a historical prompt.
    pub up_to_and_including_message_id: Option<String>,

    /// Assembly options
    pub options: ContextOptions,
}

impl ContextRequest {
    /// A request scoped to a thread.
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    /// A request scoped to a user only (no thread history).
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Also attach a user to this request.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Append an in-flight message.
    pub fn with_message(mut self, message: InputMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the assembly options.
    pub fn with_options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound the context at the given message, inclusive.
    pub fn up_to(mut self, message_id: impl Into<String>) -> Self {
        self.up_to_and_including_message_id = Some(message_id.into());
        self
    }
}

/// Assembles the ordered message context for a prompt.
///
/// Always needs a fetcher and thread lookup. A searcher and an embedder
/// are optional capabilities: without a searcher, requesting search fails
/// with [`ContextError::SearchUnavailable`]; without an embedder,
/// requesting vector search fails with [`ContextError::MissingEmbedder`]
/// before anything leaves the process.
pub struct ContextAssembler {
    /// Pages of recent thread history
    fetcher: Arc<dyn MessageFetcher>,

    /// Thread lookup, for resolving a thread's owning user
    threads: Arc<dyn ThreadStore>,

    /// Search capability, when the execution context has one
    searcher: Option<Arc<dyn MessageSearcher>>,

    /// Query embedding capability, required for vector search
    embedder: Option<Arc<dyn QueryEmbedder>>,
}

impl ContextAssembler {
    /// Create an assembler with the always-required collaborators.
    pub fn new(fetcher: Arc<dyn MessageFetcher>, threads: Arc<dyn ThreadStore>) -> Self {
        Self {
            fetcher,
            threads,
            searcher: None,
            embedder: None,
        }
    }

    /// Attach a search capability.
    pub fn with_searcher(mut self, searcher: Arc<dyn MessageSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    /// Attach a query embedding capability.
    pub fn with_embedder(mut self, embedder: Arc<dyn QueryEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Assemble the context for a prompt.
    ///
    /// Returns the deduplicated message list, ascending by
    /// `(order, step_order)`, with orphaned tool messages removed.
    pub async fn assemble(&self, request: ContextRequest) -> Result<Vec<Message>, ContextError> {
        if request.user_id.is_none() && request.thread_id.is_none() {
            return Err(ContextError::InvalidScope);
        }
        let opts = &request.options;
        debug!(
            thread_id = request.thread_id.as_deref().unwrap_or("-"),
            user_id = request.user_id.as_deref().unwrap_or("-"),
            "Assembling context"
        );

        // ── Recent thread history ──
        let mut included: Option<HashSet<String>> = None;
        let mut context_messages: Vec<Message> = Vec::new();
        if let Some(thread_id) = &request.thread_id {
            if opts.recent_messages != Some(0)
                || request.up_to_and_including_message_id.is_some()
            {
                let page = list_messages(
                    self.fetcher.as_ref(),
                    ListMessagesRequest {
                        thread_id: thread_id.clone(),
                        pagination: PaginationOptions::first(
                            opts.recent_messages.unwrap_or(DEFAULT_RECENT_MESSAGES),
                        ),
                        order: SortOrder::Desc,
                        statuses: Some(vec![MessageStatus::Success]),
                        exclude_tool_messages: opts.exclude_tool_messages,
                        up_to_and_including_message_id: request
                            .up_to_and_including_message_id
                            .clone(),
                    },
                )
                .await?;
                included = Some(page.page.iter().map(|m| m.id.clone()).collect());
                // Fetched newest-first; flip back to chronological
                context_messages.extend(page.page.into_iter().rev());
            }
        }

        // ── Search ──
        if let Some(search) = opts.search_options.as_ref().filter(|s| s.enabled()) {
            let hits = self.search(&request, search, &context_messages).await?;
            let included = included.as_ref();
            // Hits go in front in relevance order; the sort below puts
            // everything in its chronological place
            context_messages.splice(
                0..0,
                hits.into_iter()
                    .filter(|m| !included.is_some_and(|ids| ids.contains(&m.id))),
            );
        }

        context_messages.sort_by_key(Message::key);
        let result = filter_orphaned_tool_messages(context_messages);
        debug!(messages = result.len(), "Context assembled");
        Ok(result)
    }

    /// Run the search path and return raw hits, most relevant first.
    async fn search(
        &self,
        request: &ContextRequest,
        search: &SearchOptions,
        fetched: &[Message],
    ) -> Result<Vec<Message>, ContextError> {
        let Some(searcher) = &self.searcher else {
            return Err(ContextError::SearchUnavailable);
        };

        // When regenerating at a bound message, that message's own text is
        // the query; otherwise the last in-flight message is.
        let target: Option<MessageContent> = request
            .up_to_and_including_message_id
            .as_ref()
            .and_then(|id| fetched.iter().find(|m| &m.id == id))
            .map(|m| m.content.clone());
        let text = match &target {
            Some(content) => content.text().ok_or_else(|| {
                ContextError::NoSearchableText("bound message has no text".into())
            })?,
            None => request
                .messages
                .last()
                .ok_or_else(|| ContextError::NoSearchableText("no messages to search".into()))?
                .text()
                .ok_or_else(|| {
                    ContextError::NoSearchableText("last message has no text".into())
                })?,
        };

        // Vector search fails fast without an embedder, before any
        // embedding or search call goes out
        let embedding = if search.vector_search {
            let Some(embedder) = &self.embedder else {
                return Err(ContextError::MissingEmbedder);
            };
            Some(embedder.embed_query(&text).await?)
        } else {
            None
        };

        // User-wide scope: an explicit user id, or the thread's owner
        let search_all_messages_for_user_id = if request.options.search_other_threads {
            match &request.user_id {
                Some(user_id) => Some(user_id.clone()),
                None => match &request.thread_id {
                    Some(thread_id) => self
                        .threads
                        .get_thread(thread_id)
                        .await?
                        .and_then(|t| t.user_id),
                    None => None,
                },
            }
        } else {
            None
        };

        let (vector, vector_model, embedder_threshold) = match embedding {
            Some(e) => (Some(e.vector), Some(e.model), e.score_threshold),
            None => (None, None, None),
        };
        // Threshold precedence: embedder's floor, then the caller's, then 0
        let vector_score_threshold = embedder_threshold
            .or(search.vector_score_threshold)
            .unwrap_or(DEFAULT_VECTOR_SCORE_THRESHOLD);

        let hits = searcher
            .search_messages(SearchMessagesRequest {
                thread_id: request.thread_id.clone(),
                search_all_messages_for_user_id,
                before_message_id: request.up_to_and_including_message_id.clone(),
                limit: search.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
                message_range: search.message_range.unwrap_or_default(),
                text,
                vector,
                vector_model,
                vector_score_threshold,
            })
            .await?;
        debug!(hits = hits.len(), "Search returned context candidates");
        Ok(hits)
    }
}
