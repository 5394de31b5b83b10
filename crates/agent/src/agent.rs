//! The agent facade implementation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use threadloom_context::{ContextAssembler, ContextOptions, ContextRequest};
use threadloom_core::error::ProviderError;
use threadloom_core::{
    CreateThreadRequest, DomainEvent, EventBus, InputMessage, Message, MessageStatus,
    MessageStore, Provider, ProviderRequest, QueryEmbedder, Result, SaveMessageRequest, Thread,
    Usage,
};

use crate::usage::{UsageEvent, UsageHandler};

/// The outcome of one successful generation.
#[derive(Debug, Clone)]
pub struct GeneratedText {
    /// The saved assistant reply
    pub message: Message,

    /// Token usage, when the provider reported it
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl GeneratedText {
    /// The reply text, empty when the model produced none.
    pub fn text(&self) -> String {
        self.message.text().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum PromptSource {
    /// Save this message as the prompt, then reply to it.
    New(InputMessage),
    /// Reply (again) to an already-saved prompt.
    Existing(String),
}

/// What to generate a reply to, and how much context to gather for it.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    source: PromptSource,
    context_options: Option<ContextOptions>,
    user_id: Option<String>,
}

impl GenerateRequest {
    /// Reply to a new user prompt.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::from_message(InputMessage::user(text))
    }

    /// Reply to a prepared message (multi-part content, non-user roles).
    pub fn from_message(message: InputMessage) -> Self {
        Self {
            source: PromptSource::New(message),
            context_options: None,
            user_id: None,
        }
    }

    /// Regenerate the reply to an already-saved prompt.
    ///
    /// Context is assembled as it stood at that message; the new reply
    /// lands on the same turn at the next step, leaving earlier replies
    /// in place.
    pub fn regenerate(prompt_message_id: impl Into<String>) -> Self {
        Self {
            source: PromptSource::Existing(prompt_message_id.into()),
            context_options: None,
            user_id: None,
        }
    }

    /// Override the agent's default context options for this call.
    pub fn with_context_options(mut self, options: ContextOptions) -> Self {
        self.context_options = Some(options);
        self
    }

    /// Attribute the generation to a user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// An agent: one provider, one model, one message store, and the context
/// pipeline that ties them together.
///
/// `generate_text` is the main entry point. It saves the prompt, assembles
/// context bounded at that prompt, calls the provider, and saves the reply
/// on the same turn — so a thread's history is complete even when the
/// process crashes between steps, and concurrent generations on one thread
/// never see each other's partial work.
pub struct Agent {
    /// Recorded on every message this agent saves
    name: String,

    /// System instructions prepended to every completion
    instructions: Option<String>,

    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,

    store: Arc<dyn MessageStore>,

    /// Embeds message text at save time and search queries at assembly
    /// time. Without one, messages save unembedded and vector search is
    /// unavailable.
    embedder: Option<Arc<dyn QueryEmbedder>>,

    /// Default context options; callers can override per generation
    context_options: ContextOptions,

    usage_handler: Option<Arc<dyn UsageHandler>>,
    events: Option<Arc<EventBus>>,
}

impl Agent {
    /// Create an agent with defaults: no instructions, temperature 0.7,
    /// default context options.
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            store,
            embedder: None,
            context_options: ContextOptions::default(),
            usage_handler: None,
            events: None,
        }
    }

    /// Set the system instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the tokens generated per reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Attach a query embedder, enabling embed-on-save and vector search.
    pub fn with_embedder(mut self, embedder: Arc<dyn QueryEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the default context options.
    pub fn with_context_options(mut self, options: ContextOptions) -> Self {
        self.context_options = options;
        self
    }

    /// Attach a usage handler.
    pub fn with_usage_handler(mut self, handler: Arc<dyn UsageHandler>) -> Self {
        self.usage_handler = Some(handler);
        self
    }

    /// Publish [`DomainEvent`]s to the given bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// This agent's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn assembler(&self) -> ContextAssembler {
        let mut assembler = ContextAssembler::new(self.store.clone(), self.store.clone())
            .with_searcher(self.store.clone());
        if let Some(embedder) = &self.embedder {
            assembler = assembler.with_embedder(embedder.clone());
        }
        assembler
    }

    /// Create a thread for this agent's conversations.
    pub async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread> {
        Ok(self.store.create_thread(request).await?)
    }

    /// Save a message, embedding its text first when an embedder is wired.
    ///
    /// Embedding failures are logged and skipped; the message still saves.
    pub async fn save_message(&self, mut request: SaveMessageRequest) -> Result<Message> {
        if request.embedding.is_none() {
            if let (Some(embedder), Some(text)) = (&self.embedder, request.message.text()) {
                match embedder.embed_query(&text).await {
                    Ok(embedding) => request.embedding = Some(embedding.vector),
                    Err(e) => warn!(error = %e, "Embedding failed, saving without one"),
                }
            }
        }
        Ok(self.store.save_message(request).await?)
    }

    /// Assemble context without generating — exactly what the model would
    /// see, minus the system instructions.
    pub async fn fetch_context(&self, request: ContextRequest) -> Result<Vec<Message>> {
        Ok(self.assembler().assemble(request).await?)
    }

    /// Generate a reply in the given thread.
    pub async fn generate_text(
        &self,
        thread_id: &str,
        request: GenerateRequest,
    ) -> Result<GeneratedText> {
        info!(agent = %self.name, thread_id, "Generating reply");

        // The prompt: save the new message, or rerun from a saved one.
        let prompt_message_id = match request.source {
            PromptSource::Existing(id) => id,
            PromptSource::New(message) => {
                let mut save = SaveMessageRequest::new(thread_id, message);
                save.user_id = request.user_id.clone();
                self.save_message(save).await?.id
            }
        };

        // Context as it stood at the prompt, so writes that land on the
        // thread mid-generation never leak into this completion.
        let options = request
            .context_options
            .unwrap_or_else(|| self.context_options.clone());
        let mut context_request = ContextRequest::for_thread(thread_id)
            .up_to(&prompt_message_id)
            .with_options(options);
        if let Some(user_id) = &request.user_id {
            context_request = context_request.with_user(user_id);
        }
        let context = self.assembler().assemble(context_request).await?;
        debug!(messages = context.len(), "Context assembled for generation");

        let mut messages = Vec::with_capacity(context.len() + 1);
        if let Some(instructions) = &self.instructions {
            messages.push(InputMessage::system(instructions));
        }
        messages.extend(context.iter().map(InputMessage::from));

        let mut provider_request = ProviderRequest::new(&self.model, messages);
        provider_request.temperature = self.temperature;
        provider_request.max_tokens = self.max_tokens;

        let response = match self.provider.complete(provider_request).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(thread_id, &prompt_message_id, &e).await;
                return Err(e.into());
            }
        };

        // The reply continues the prompt's turn at the next step.
        let mut save = SaveMessageRequest::new(thread_id, response.message);
        save.prompt_message_id = Some(prompt_message_id);
        save.user_id = request.user_id;
        save.agent_name = Some(self.name.clone());
        save.model = Some(response.model.clone());
        let message = self.save_message(save).await?;

        if let Some(usage) = response.usage {
            if let Some(handler) = &self.usage_handler {
                handler
                    .on_usage(UsageEvent {
                        agent_name: self.name.clone(),
                        thread_id: thread_id.to_string(),
                        user_id: message.user_id.clone(),
                        model: response.model.clone(),
                        usage,
                    })
                    .await;
            }
        }

        if let Some(events) = &self.events {
            events.publish(DomainEvent::ResponseGenerated {
                thread_id: thread_id.to_string(),
                agent_name: self.name.clone(),
                model: response.model.clone(),
                tokens_used: response.usage.map_or(0, |u| u.total_tokens),
                timestamp: Utc::now(),
            });
        }

        Ok(GeneratedText {
            message,
            usage: response.usage,
            model: response.model,
        })
    }

    /// Record a failed generation as a failed assistant step so the thread
    /// keeps a trace of it. Failed messages never feed back into context.
    async fn record_failure(&self, thread_id: &str, prompt_message_id: &str, error: &ProviderError) {
        let mut failed = SaveMessageRequest::new(thread_id, InputMessage::assistant(""));
        failed.prompt_message_id = Some(prompt_message_id.to_string());
        failed.status = MessageStatus::Failed;
        failed.error = Some(error.to_string());
        failed.agent_name = Some(self.name.clone());
        failed.model = Some(self.model.clone());
        if let Err(e) = self.store.save_message(failed).await {
            warn!(error = %e, "Could not record failed generation");
        }
    }
}
