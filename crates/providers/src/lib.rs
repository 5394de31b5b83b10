//! LLM provider implementations for Threadloom.
//!
//! All providers implement the `threadloom_core::Provider` trait;
//! [`ModelEmbedder`] adapts any of them to the `QueryEmbedder` seam that
//! vector search consumes.

pub mod embedder;
pub mod openai_compat;

pub use embedder::ModelEmbedder;
pub use openai_compat::OpenAiCompatProvider;
