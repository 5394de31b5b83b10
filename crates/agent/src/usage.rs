//! Token usage reporting.
//!
//! Providers return usage counters with every completion; the agent hands
//! them to a [`UsageHandler`] so deployments can meter, bill, or just log
//! them without the agent knowing which.

use async_trait::async_trait;
use tracing::info;

use threadloom_core::Usage;

/// Token usage for one completed generation.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    /// Which agent generated
    pub agent_name: String,

    /// The thread the generation belongs to
    pub thread_id: String,

    /// The user billed for it, if any
    pub user_id: Option<String>,

    /// Which model responded
    pub model: String,

    /// The provider's token counters
    pub usage: Usage,
}

/// Receives usage reports after each successful generation.
#[async_trait]
pub trait UsageHandler: Send + Sync {
    async fn on_usage(&self, event: UsageEvent);
}

/// Logs usage at info level — the handler to wire when metering isn't.
pub struct LogUsageHandler;

#[async_trait]
impl UsageHandler for LogUsageHandler {
    async fn on_usage(&self, event: UsageEvent) {
        info!(
            agent = %event.agent_name,
            thread_id = %event.thread_id,
            model = %event.model,
            prompt_tokens = event.usage.prompt_tokens,
            completion_tokens = event.usage.completion_tokens,
            total_tokens = event.usage.total_tokens,
            "Token usage"
        );
    }
}
