//! `threadloom chat` — Interactive or single-message chat mode.
//!
//! Everything runs against an in-memory store: one thread per session,
//! every prompt routed through an [`Agent`]. The slash commands expose the
//! context machinery — `/context` reassembles and prints exactly what the
//! last prompt pulled in.

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use threadloom_agent::{Agent, GenerateRequest};
use threadloom_config::AppConfig;
use threadloom_context::{ContextOptions, ContextRequest, SearchOptions};
use threadloom_core::{
    CreateThreadRequest, ListMessagesRequest, Message, MessageFetcher, Provider, Role,
};
use threadloom_providers::ModelEmbedder;
use threadloom_store::InMemoryStore;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Ollama runs keyless; everything else needs a key — say so early
    if config.provider.name != "ollama" && !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY       (for the default OpenAI provider)");
        eprintln!("    OPENROUTER_API_KEY");
        eprintln!("    THREADLOOM_API_KEY   (generic)");
        eprintln!();
        eprintln!("  Or add api_key under [provider] in threadloom.toml.");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider: Arc<dyn Provider> = Arc::new(super::build_provider(&config));
    let store = Arc::new(InMemoryStore::new());

    let embeddings = config.embeddings_enabled();
    let mut agent = Agent::new(
        config.agent.name.clone(),
        provider.clone(),
        config.provider.chat_model.clone(),
        store.clone(),
    )
    .with_temperature(config.agent.temperature)
    .with_max_tokens(config.agent.max_tokens)
    .with_context_options(config.context.to_options());

    if let Some(instructions) = &config.agent.instructions {
        agent = agent.with_instructions(instructions);
    }
    if embeddings {
        let embedder =
            ModelEmbedder::new(provider.clone(), config.provider.embedding_model.clone());
        agent = agent.with_embedder(Arc::new(embedder));
    }

    let thread = agent
        .create_thread(CreateThreadRequest::for_user("cli"))
        .await?;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = agent
            .generate_text(&thread.id, GenerateRequest::prompt(&msg))
            .await?;
        eprint!("\r              \r");
        println!("{}", reply.text());
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║       Threadloom Chat — Interactive Mode     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:    {}", config.provider.name);
    println!("  Model:       {}", config.provider.chat_model);
    if embeddings {
        println!("  Embeddings:  {}", config.provider.embedding_model);
    } else {
        println!("  Embeddings:  off (vector search unavailable)");
    }
    println!("  Agent:       {}", agent.name());
    println!("  Thread:      {}", thread.id);
    println!();
    println!("  Type a message and press Enter. Commands:");
    println!("    /context        show what the last prompt pulled in");
    println!("    /search on|off  toggle search for later prompts");
    println!("    /history        print the thread so far");
    println!("    /quit           leave");
    println!();

    let mut options = config.context.to_options();
    let mut last_reply: Option<Message> = None;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "/quit" | "/exit" | "exit" => break,
            "/history" => print_history(&store, &thread.id).await?,
            "/search on" => {
                options.search_options = Some(if embeddings {
                    SearchOptions::hybrid()
                } else {
                    SearchOptions::text()
                });
                println!(
                    "  Search enabled ({}).",
                    if embeddings { "text + vector" } else { "text only" }
                );
            }
            "/search off" => {
                options.search_options = None;
                println!("  Search disabled.");
            }
            "/context" => {
                print_last_context(&agent, &store, &thread.id, last_reply.as_ref(), &options)
                    .await?;
            }
            unknown if unknown.starts_with('/') => {
                println!("  Unknown command: {unknown}");
            }
            prompt => {
                eprint!("  ...");
                let request =
                    GenerateRequest::prompt(prompt).with_context_options(options.clone());
                match agent.generate_text(&thread.id, request).await {
                    Ok(reply) => {
                        eprint!("\r     \r");
                        println!();
                        for text_line in reply.text().lines() {
                            println!("  {} > {text_line}", agent.name());
                        }
                        println!();
                        last_reply = Some(reply.message);
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

async fn print_history(
    store: &InMemoryStore,
    thread_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let page = store
        .list_thread_messages(ListMessagesRequest::latest(thread_id, 100))
        .await?;
    if page.page.is_empty() {
        println!("  (no messages yet)");
        return Ok(());
    }
    println!();
    // The page is newest-first; read it back in conversation order
    for message in page.page.iter().rev() {
        print_message(message);
    }
    println!();
    Ok(())
}

/// Reassemble and print the context for the last prompt — what the model
/// saw, under the current options.
async fn print_last_context(
    agent: &Agent,
    store: &InMemoryStore,
    thread_id: &str,
    last_reply: Option<&Message>,
    options: &ContextOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(reply) = last_reply else {
        println!("  Nothing generated yet — say something first.");
        return Ok(());
    };

    // The prompt opened the reply's turn
    let page = store
        .list_thread_messages(ListMessagesRequest::latest(thread_id, 200))
        .await?;
    let Some(prompt) = page.page.iter().find(|m| m.key() == (reply.order, 0)) else {
        println!("  Could not find the prompt for the last reply.");
        return Ok(());
    };

    let request = ContextRequest::for_thread(thread_id)
        .up_to(&prompt.id)
        .with_options(options.clone());
    let context = agent.fetch_context(request).await?;

    println!();
    println!(
        "  Context for \"{}\" — {} message(s):",
        prompt.text().unwrap_or_default(),
        context.len()
    );
    for message in &context {
        print_message(message);
    }
    println!();
    Ok(())
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "You",
        Role::Assistant => message.agent_name.as_deref().unwrap_or("Assistant"),
        Role::System => "System",
        Role::Tool => "Tool",
    };
    let when = message.created_at.format("%H:%M:%S");
    let position = format!("{}.{}", message.order, message.step_order);
    println!(
        "  [{when}] ({position}) {who} > {}",
        message.text().unwrap_or_default()
    );
}
