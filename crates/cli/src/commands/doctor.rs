//! `threadloom doctor` — Validate config and report wired capabilities.

use threadloom_config::AppConfig;
use threadloom_core::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Threadloom Doctor — Configuration Diagnostics");
    println!("================================================\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!();
            println!("  ⚠️  1 issue found. See above for details.");
            return Ok(());
        }
    };

    println!("     provider:   {}", config.provider.name);
    println!("     chat model: {}", config.provider.chat_model);

    // API key
    if config.provider.name == "ollama" {
        println!("  ✅ No API key needed (ollama)");
    } else if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key — set OPENAI_API_KEY or add api_key to threadloom.toml");
        issues += 1;
    }

    // Embeddings decide whether vector search can be wired
    if config.embeddings_enabled() {
        println!(
            "  ✅ Embeddings configured ({}) — hybrid search available",
            config.provider.embedding_model
        );
    } else {
        println!("  ⚠️  Embeddings disabled — search runs on keywords only");
        issues += 1;
    }

    // Reachability
    let provider = super::build_provider(&config);
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Provider reachable"),
        Ok(false) => {
            println!("  ⚠️  Provider responded but reported itself unhealthy");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Provider unreachable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
