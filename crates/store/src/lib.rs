//! Reference message store for threadloom.
//!
//! [`InMemoryStore`] keeps threads and messages in process memory behind a
//! [`tokio::sync::RwLock`] and implements every storage trait the rest of the
//! workspace consumes: listing, searching, thread management, and writes. It
//! is the backend used by the CLI and by integration tests; production
//! deployments swap in their own implementation of the same traits.
//!
//! Search is hybrid: keyword occurrence scoring over message text, cosine
//! similarity over stored embeddings, and reciprocal rank fusion to merge the
//! two rankings when both produce hits.

pub mod in_memory;
pub mod search;
pub mod vector;

pub use in_memory::InMemoryStore;
pub use vector::{cosine_similarity, reciprocal_rank_fusion};
