//! CLI subcommand implementations.

pub mod chat;
pub mod doctor;

use threadloom_config::AppConfig;
use threadloom_providers::OpenAiCompatProvider;

/// Build the provider the config names. Validation already rejected
/// anything but openai, openrouter, and ollama.
pub(crate) fn build_provider(config: &AppConfig) -> OpenAiCompatProvider {
    let api_key = config.provider.api_key.clone().unwrap_or_default();
    match (config.provider.name.as_str(), &config.provider.base_url) {
        ("ollama", base_url) => OpenAiCompatProvider::ollama(base_url.as_deref()),
        (name, Some(base_url)) => OpenAiCompatProvider::new(name, base_url, api_key),
        ("openrouter", None) => OpenAiCompatProvider::openrouter(api_key),
        (_, None) => OpenAiCompatProvider::openai(api_key),
    }
}
