//! # Threadloom Core
//!
//! Domain types, traits, and error definitions for the Threadloom context
//! library. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every backend capability is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod embedding;
pub mod error;
pub mod event;
pub mod message;
pub mod pagination;
pub mod provider;
pub mod store;
pub mod thread;

// Re-export key types at crate root for ergonomics
pub use embedding::{QueryEmbedder, QueryEmbedding};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ContentPart, InputMessage, Message, MessageContent, MessageStatus, Role};
pub use pagination::{MessagePage, PaginationOptions, SortOrder};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::{
    ListMessagesRequest, MessageFetcher, MessageRange, MessageSearcher, MessageStore,
    MessageWriter, SaveMessageRequest, SearchMessagesRequest, ThreadStore,
};
pub use thread::{CreateThreadRequest, Thread, ThreadStatus};
