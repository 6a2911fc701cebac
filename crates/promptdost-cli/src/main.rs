//! promptdost CLI: generate prompts, run the HTTP gateway, manage history.
//!
//! Usage:
//!   promptdost generate "<idea>"  : Turn an idea into a prompt
//!   promptdost serve              : Start the HTTP gateway
//!   promptdost history            : List saved prompts
//!   promptdost models             : Show the backend ranking
//!   promptdost onboard            : Create a default configuration
//!   promptdost status             : Show current configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use promptdost_core::config::Config;
use promptdost_core::engine::FallbackEngine;
use promptdost_core::gateway::{self, AppState};
use promptdost_core::history::HistoryStore;
use promptdost_core::locale::Message;
use promptdost_core::provider::openrouter::OpenRouterTransport;
use promptdost_core::provider::types::validate_idea;

#[derive(Parser)]
#[command(
    name = "promptdost",
    version,
    about = "Turn a short idea into a ready-to-use AI prompt",
    long_about = "promptdost turns a short idea into a detailed AI prompt.\n\nTries a ranked list of free models and returns the first usable answer."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn an idea into a prompt
    Generate {
        /// The idea (at least 3 characters)
        idea: String,

        /// Referer sent to the backends (overrides config)
        #[arg(short, long)]
        referer: Option<String>,

        /// Do not save the result to history
        #[arg(long)]
        no_history: bool,
    },

    /// Start the HTTP gateway
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage saved prompts
    History {
        #[command(subcommand)]
        action: Option<HistoryCommands>,
    },

    /// Show the backend ranking
    Models,

    /// Create or reset the default configuration
    Onboard,

    /// Show configuration status
    Status,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List saved prompts, newest first
    List,
    /// Print one saved prompt
    Show {
        /// Item ID
        id: String,
    },
    /// Delete one saved prompt
    Delete {
        /// Item ID
        id: String,
    },
    /// Delete every saved prompt
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            idea,
            referer,
            no_history,
        } => cmd_generate(&idea, referer.as_deref(), no_history).await?,
        Commands::Serve { host, port } => cmd_serve(host, port).await?,
        Commands::History { action } => cmd_history(action)?,
        Commands::Models => cmd_models()?,
        Commands::Onboard => cmd_onboard()?,
        Commands::Status => cmd_status()?,
    }

    Ok(())
}

// ── Shared Setup ────────────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<()> {
    if let Err(errors) = config.validate() {
        eprintln!("\n  \x1b[31m❌ Configuration errors:\x1b[0m");
        for e in &errors {
            eprintln!("     • {}", e);
        }
        eprintln!();
        anyhow::bail!("Fix the above {} error(s) in config.json", errors.len());
    }
    Ok(())
}

/// Build the engine from a validated config.
fn setup_engine(config: &Config) -> Result<FallbackEngine> {
    let entry = &config.providers.openrouter;
    let api_key = entry
        .resolved_api_key()
        .ok_or_else(|| anyhow::anyhow!("No OpenRouter API key configured"))?;

    let client = reqwest::Client::builder()
        .connect_timeout(config.engine.attempt_timeout())
        .build()?;
    let transport = OpenRouterTransport::new(&api_key, entry.api_base.as_deref(), &entry.title, client);

    Ok(FallbackEngine::new(config.engine.registry(), Box::new(transport))
        .with_attempt_timeout(config.engine.attempt_timeout())
        .with_sampling(config.engine.sampling()))
}

fn history_store(config: &Config) -> HistoryStore {
    HistoryStore::new(config.history_path(), config.history.max_entries)
}

// ── Generate Command ────────────────────────────────────────────────

async fn cmd_generate(idea: &str, referer: Option<&str>, no_history: bool) -> Result<()> {
    let config = Config::load()?;
    let locale = config.gateway.locale;

    let idea = match validate_idea(Some(idea)) {
        Ok(idea) => idea,
        Err(e) => {
            eprintln!("  \x1b[31m{}\x1b[0m", locale.text(Message::from(&e)));
            anyhow::bail!(e);
        }
    };

    validate_config(&config)?;
    let engine = setup_engine(&config)?;
    let referer = referer.unwrap_or(config.gateway.default_referer.as_str());

    match engine
        .generate_within(idea, referer, config.gateway.deadline())
        .await
    {
        Ok(generation) => {
            println!();
            println!("  \x1b[32m{}\x1b[0m", generation.text);
            println!();
            println!(
                "  via {} ({} attempt(s))",
                generation.backend,
                generation.attempts.len()
            );

            if config.history.enabled && !no_history {
                let item = history_store(&config).record(
                    idea,
                    &generation.text,
                    Some(generation.backend.model()),
                )?;
                println!("  Saved to history: {}", item.id);
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e.summary(), "Prompt generation failed");
            eprintln!("  \x1b[31m{}\x1b[0m", locale.text(Message::AllBackendsBusy));
            for attempt in e.attempts() {
                if let Some(err) = attempt.error() {
                    eprintln!("     • {}: {}", attempt.backend, err);
                }
            }
            Err(e.into())
        }
    }
}

// ── Serve Command ───────────────────────────────────────────────────

async fn cmd_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = Config::load()?;
    validate_config(&config)?;

    let engine = Arc::new(setup_engine(&config)?);
    let mut state = AppState::new(Arc::clone(&engine), config.gateway.deadline())
        .with_locale(config.gateway.locale)
        .with_default_referer(config.gateway.default_referer.clone());
    if config.history.enabled {
        state = state.with_history(Arc::new(history_store(&config)));
    }

    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    println!("  promptdost gateway starting on http://{}", addr);
    println!(
        "  Backends: {} | Attempt timeout: {}s | Deadline: {}s",
        engine.registry().len(),
        config.engine.attempt_timeout_secs,
        config.gateway.deadline_secs
    );
    println!("  Press Ctrl+C for graceful shutdown.");

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn(gateway::serve(state, addr, cancel.clone()));

    // Wait for Ctrl+C, or for the server to stop on its own (e.g. bind failure).
    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        res = &mut server => {
            res??;
            false
        }
    };

    if interrupted {
        println!("\n  ⏳ Shutting down gracefully...");
        cancel.cancel();
        server.await??;
    }

    println!("  ✅ Shutdown complete.");
    Ok(())
}

// ── History Commands ────────────────────────────────────────────────

fn cmd_history(action: Option<HistoryCommands>) -> Result<()> {
    let config = Config::load()?;
    let store = history_store(&config);

    match action {
        Some(HistoryCommands::Show { id }) => match store.get(&id) {
            Some(item) => {
                println!();
                println!("  Idea:   {}", item.idea);
                if let Some(model) = &item.model {
                    println!("  Model:  {}", model);
                }
                println!();
                println!("{}", item.prompt);
                println!();
            }
            None => println!("  ❌ Not found: {}", id),
        },
        Some(HistoryCommands::Delete { id }) => {
            if store.remove(&id)? {
                println!("  ✅ Deleted: {}", id);
            } else {
                println!("  ❌ Not found: {}", id);
            }
        }
        Some(HistoryCommands::Clear) => {
            let removed = store.clear()?;
            println!("  ✅ Cleared {} item(s).", removed);
        }
        Some(HistoryCommands::List) | None => {
            let items = store.list();
            if items.is_empty() {
                println!("  No saved prompts.");
            } else {
                println!();
                for item in items {
                    println!("  📝 {} [{}] {}", item.idea, item.id, format_timestamp(item.timestamp));
                }
                println!();
            }
        }
    }

    Ok(())
}

fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

// ── Models Command ──────────────────────────────────────────────────

fn cmd_models() -> Result<()> {
    let config = Config::load()?;
    let registry = config.engine.registry();

    println!();
    for (rank, backend) in registry.iter().enumerate() {
        println!("  {}. {}", rank + 1, backend);
    }
    if registry.is_empty() {
        println!("  ❌ No models configured.");
    }
    println!();
    Ok(())
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  ✅ Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Edit the config file and add your OpenRouter API key");
    println!("     (or export OPENROUTER_API_KEY)");
    println!("  2. Run `promptdost generate \"your idea\"`");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn cmd_status() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load()?;

    println!();
    println!("  promptdost status");
    println!("  ─────────────────────────────────────");

    if config_path.exists() {
        println!("  Config:    {}", config_path.display());
    } else {
        println!("  Config:    ⚠️  Not found, using defaults (run `promptdost onboard`)");
    }

    match config.providers.openrouter.resolved_api_key() {
        Some(_) => println!("  Provider:  ✅ openrouter configured"),
        None => println!("  Provider:  ❌ No API key"),
    }

    println!("  Models:    {} ranked", config.engine.models.len());
    println!(
        "  Timeouts:  {}s per attempt, {}s overall",
        config.engine.attempt_timeout_secs, config.gateway.deadline_secs
    );
    println!("  Locale:    {}", config.gateway.locale.code());

    let store = history_store(&config);
    if config.history.enabled {
        println!(
            "  History:   {} saved ({})",
            store.list().len(),
            store.path().display()
        );
    } else {
        println!("  History:   disabled");
    }

    if let Err(errors) = config.validate() {
        println!("  Problems:");
        for e in errors {
            println!("     • {}", e);
        }
    }

    println!();
    Ok(())
}
