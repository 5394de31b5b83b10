//! # Threadloom Agent
//!
//! The high-level facade tying the pieces together: a named agent with a
//! provider, a model, a message store, and optionally an embedder.
//!
//! One call does the whole round trip:
//!
//! 1. **Save** the prompt to the thread (embedding it when configured)
//! 2. **Assemble** context bounded at that prompt — recent turns plus
//!    search hits when requested
//! 3. **Complete** against the provider
//! 4. **Save** the reply on the same turn, report usage, publish events
//!
//! Several agents can share one store and one thread; each reply carries
//! the generating agent's name and model, so handoffs leave a full trail.

pub mod agent;
pub mod usage;

pub use agent::{Agent, GenerateRequest, GeneratedText};
pub use usage::{LogUsageHandler, UsageEvent, UsageHandler};
