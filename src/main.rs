//! Banking assistant entry point.
//!
//! Initialises the router context from environment configuration, seeds the
//! in-memory catalog and FAQ index from their JSON files, and runs an
//! interactive REPL loop. Type `/quit` to exit or `new conversation` to
//! reset session memory.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use bank_assistant::{
    agent::Agent,
    catalog::InMemoryCatalog,
    config::load_config,
    faq::InMemoryFaqIndex,
    registry::EntityRegistry,
    router::RouterContext,
    state::ConversationState,
    types::RouterRequest,
};

#[tokio::main]
async fn main() {
    // Structured logging — default level WARN to keep the REPL clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Please check your .env file. See .env.example for required variables.");
            std::process::exit(1);
        }
    };

    let store = Arc::new(match InMemoryCatalog::from_json_file(&config.catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!(
                "Warning: catalog seed '{}' not loaded ({}); starting empty",
                config.catalog_path, e
            );
            InMemoryCatalog::new()
        }
    });

    let faq = Arc::new(match InMemoryFaqIndex::from_json_file(&config.faq_index_path) {
        Ok(index) => index,
        Err(e) => {
            eprintln!(
                "Warning: FAQ seed '{}' not loaded ({}); starting empty",
                config.faq_index_path, e
            );
            InMemoryFaqIndex::new()
        }
    });

    let registry = Arc::new(EntityRegistry::new(store.clone(), config.registry_refresh));
    let state = Arc::new(ConversationState::new(config.session_ttl));

    println!("Banking assistant starting...");
    println!("   Model:    {}", config.llm_model);
    println!("   Catalog:  {}", config.catalog_path);

    let agent = Agent::new(RouterContext {
        store,
        faq,
        registry,
        state,
        config,
    });

    println!("Type your question (/quit to exit, 'new conversation' to reset)\n");

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush().unwrap_or_default();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "/quit" || input == "/exit" {
                    break;
                }

                let request = RouterRequest {
                    session_id: "cli".to_string(),
                    utterance: input.to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                };

                let reply = agent.process(&request).await;
                println!("\nAssistant: {}\n", reply.text);
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }

    println!("\nGoodbye!");
}
