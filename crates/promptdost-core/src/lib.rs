//! promptdost-core: turns a short idea into a ready-to-use AI prompt.
//!
//! Text generation is delegated to a ranked list of free LLM backends. The
//! [`engine`] tries them one at a time and returns the first usable answer.
//!
//! - [`config`]: Typed configuration loading from JSON
//! - [`provider`]: Request builder, response extractor, and the OpenRouter transport
//! - [`engine`]: Backend registry and the sequential fallback loop
//! - [`error`]: Attempt, engine, and validation errors
//! - [`gateway`]: HTTP endpoint in front of the engine
//! - [`history`]: Local JSONL history of generated prompts
//! - [`locale`]: User-facing messages
//!
//! # Quick Start
//!
//! ```no_run
//! use promptdost_core::config::Config;
//! use promptdost_core::engine::FallbackEngine;
//! use promptdost_core::provider::openrouter::OpenRouterTransport;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let entry = &config.providers.openrouter;
//! let key = entry.resolved_api_key().unwrap_or_default();
//!
//! let transport = OpenRouterTransport::new(
//!     &key,
//!     entry.api_base.as_deref(),
//!     &entry.title,
//!     reqwest::Client::new(),
//! );
//! let engine = FallbackEngine::new(config.engine.registry(), Box::new(transport))
//!     .with_attempt_timeout(config.engine.attempt_timeout())
//!     .with_sampling(config.engine.sampling());
//!
//! let generation = engine
//!     .generate_within("a story about dragons", "https://example.app", config.gateway.deadline())
//!     .await?;
//! println!("{}", generation.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod history;
pub mod locale;
pub mod provider;
