//! Backend transport trait and the OpenRouter implementation.
//!
//! A [`Transport`] performs exactly one call for one payload and hands the
//! raw JSON body back. It does not retry and does not interpret the body;
//! the engine passes it through [`extract::extract_text`]. Time bounding and
//! cancellation are applied by the engine, which drops the returned future
//! when the budget runs out.

pub mod extract;
pub mod openrouter;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AttemptError;
use types::{CallerContext, CompletionPayload};

/// One-shot chat-completions call.
///
/// Implementations map network failures to [`AttemptError::Transport`] and
/// non-success statuses to [`AttemptError::Rejected`]. A success status with
/// an unparseable body is [`AttemptError::EmptyContent`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        payload: &CompletionPayload,
        caller: &CallerContext,
    ) -> Result<Value, AttemptError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
