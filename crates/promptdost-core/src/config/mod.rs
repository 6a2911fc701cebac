//! Configuration module for promptdost.
//!
//! Loads typed configuration from `~/.promptdost/config.json`.
//! All fields use `serde` defaults, so a missing file or a partial file is
//! fine; only the API key has to be supplied, either here or through the
//! `OPENROUTER_API_KEY` environment variable.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{BackendRegistry, DEFAULT_MODELS};
use crate::locale::Locale;
use crate::provider::openrouter::DEFAULT_TITLE;
use crate::provider::types::SamplingParams;

/// Environment variable consulted when the config has no API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Referer used when the caller does not send one.
pub const DEFAULT_REFERER: &str = "https://prompt-dost.vercel.app";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from the default path (`~/.promptdost/config.json`).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptdost")
    }

    /// Resolved location of the history file.
    pub fn history_path(&self) -> PathBuf {
        match self.history.path.as_deref() {
            Some(raw) if raw.starts_with("~/") || raw.starts_with("~\\") => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(&raw[2..]),
            Some(raw) => PathBuf::from(raw),
            None => Self::config_dir().join("history.jsonl"),
        }
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        Self::write_template_to(&path)?;
        Ok(path)
    }

    /// Write the default config template to `path`.
    pub fn write_template_to(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "providers": {
                "openrouter": {
                    "apiKey": "sk-or-v1-YOUR_KEY_HERE"
                }
            },
            "engine": {
                "models": DEFAULT_MODELS,
                "attemptTimeoutSecs": 10
            },
            "gateway": {
                "port": 3000,
                "deadlineSecs": 15,
                "locale": "hi"
            }
        });

        std::fs::write(path, serde_json::to_string_pretty(&template)?)?;
        Ok(())
    }

    /// Validate the loaded configuration. Returns every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.providers.openrouter.resolved_api_key().is_none() {
            errors.push(format!(
                "No OpenRouter API key configured. Set providers.openrouter.apiKey \
                 in config.json or the {} environment variable.",
                API_KEY_ENV
            ));
        }

        if self.engine.models.is_empty() {
            errors.push("engine.models is empty. List at least one model.".into());
        }
        if self.engine.models.iter().any(|m| m.trim().is_empty()) {
            errors.push("engine.models contains a blank model name.".into());
        }
        if self.engine.attempt_timeout_secs == 0 {
            errors.push("engine.attemptTimeoutSecs must be greater than zero.".into());
        }
        if !(0.0..=2.0).contains(&self.engine.temperature) {
            errors.push(format!(
                "engine.temperature must be between 0 and 2 (got {}).",
                self.engine.temperature
            ));
        }
        if self.engine.max_tokens == 0 {
            errors.push("engine.maxTokens must be greater than zero.".into());
        }
        if self.gateway.deadline_secs == 0 {
            errors.push("gateway.deadlineSecs must be greater than zero.".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ── Provider Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderEntry {
    pub api_key: String,
    pub api_base: Option<String>,
    pub title: String,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            title: DEFAULT_TITLE.into(),
        }
    }
}

impl ProviderEntry {
    /// The configured key, or the environment variable when the config
    /// holds nothing usable.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, std::env::var(API_KEY_ENV).ok())
    }
}

fn is_placeholder(key: &str) -> bool {
    key.trim().is_empty() || key.contains("YOUR_")
}

fn resolve_key(configured: &str, env: Option<String>) -> Option<String> {
    if !is_placeholder(configured) {
        return Some(configured.trim().to_string());
    }
    env.filter(|k| !is_placeholder(k))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openrouter: ProviderEntry,
}

// ── Engine Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub models: Vec<String>,
    pub attempt_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let sampling = SamplingParams::default();
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            attempt_timeout_secs: 10,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
        }
    }
}

impl EngineConfig {
    pub fn registry(&self) -> BackendRegistry {
        BackendRegistry::from_models(self.models.iter().map(|m| m.trim().to_string()))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

// ── Gateway Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on one whole fallback invocation.
    pub deadline_secs: u64,
    pub default_referer: String,
    pub locale: Locale,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            deadline_secs: 15,
            default_referer: DEFAULT_REFERER.into(),
            locale: Locale::default(),
        }
    }
}

impl GatewayConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

// ── History Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub path: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 100,
            path: None,
        }
    }
}
