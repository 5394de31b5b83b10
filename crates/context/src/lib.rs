//! # Threadloom Context
//!
//! Prompt context assembly for thread-based agents. Given a thread and an
//! in-flight prompt, [`ContextAssembler::assemble`] produces the ordered
//! message list to send to the model:
//!
//! 1. Fetch recent thread history — successful messages, newest first,
//!    flipped back to chronological order.
//! 2. Optionally search the thread (or every thread the user owns) by
//!    keyword and/or embedding similarity.
//! 3. Merge, deduplicate by id, and sort by `(order, step_order)`.
//! 4. Drop tool messages whose tool calls didn't make the cut.
//!
//! The assembler talks to storage through the narrow traits in
//! `threadloom_core::store`. Wire a searcher and an embedder only where
//! those capabilities exist; requesting search without them is an error,
//! raised before any backend call goes out.

pub mod assembler;
pub mod listing;
pub mod options;
pub mod orphan;

pub use assembler::{ContextAssembler, ContextRequest};
pub use listing::list_messages;
pub use options::{
    ContextOptions, DEFAULT_MESSAGE_RANGE, DEFAULT_RECENT_MESSAGES, DEFAULT_SEARCH_LIMIT,
    DEFAULT_VECTOR_SCORE_THRESHOLD, MessageRange, SearchOptions,
};
pub use orphan::filter_orphaned_tool_messages;
