//! OpenRouter chat-completions transport.
//!
//! Works against any endpoint exposing an OpenAI-compatible
//! `/chat/completions` route; OpenRouter is the default base URL. Sends
//! the bearer key plus the `HTTP-Referer` and `X-Title` attribution headers
//! OpenRouter uses to identify the calling app.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::extract::parse_body;
use super::types::{CallerContext, CompletionPayload};
use super::Transport;
use crate::error::AttemptError;

/// Default API base.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Default value of the `X-Title` header.
pub const DEFAULT_TITLE: &str = "PromptDost";

pub struct OpenRouterTransport {
    client: Client,
    api_key: String,
    base_url: String,
    title: String,
}

impl OpenRouterTransport {
    /// Create a transport.
    ///
    /// # Arguments
    /// * `api_key` - Bearer credential
    /// * `api_base` - Custom base URL (None = OpenRouter)
    /// * `title` - Client title sent as `X-Title`
    /// * `client` - Shared HTTP client
    pub fn new(api_key: &str, api_base: Option<&str>, title: &str, client: Client) -> Self {
        let base_url = api_base
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        debug!(base_url = %base_url, "Initialized OpenRouter transport");

        Self {
            client,
            api_key: api_key.to_string(),
            base_url,
            title: title.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

// ── Error body shapes ───────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Single(ErrorBody),
    Multiple(Vec<ErrorBody>),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ErrorResponse {
    fn message(&self) -> String {
        match self {
            Self::Single(b) => b.error.message.clone(),
            Self::Multiple(v) => v
                .first()
                .map(|b| b.error.message.clone())
                .unwrap_or_else(|| "Unknown error".into()),
        }
    }
}

/// Best-effort human message for a non-success body.
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message())
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

#[async_trait]
impl Transport for OpenRouterTransport {
    async fn send(
        &self,
        payload: &CompletionPayload,
        caller: &CallerContext,
    ) -> Result<Value, AttemptError> {
        let url = self.endpoint();
        debug!(model = %payload.model, url = %url, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &caller.referer)
            .header("X-Title", &self.title)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AttemptError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }

        parse_body(&body)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
