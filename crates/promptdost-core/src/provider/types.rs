//! Request types shared by the request builder, transports, and the engine.
//!
//! A [`GenerationRequest`] is built once per invocation and shared read-only
//! across every backend attempt. [`build_payload`] shapes it into the
//! chat-completions body a given [`BackendSpec`] expects.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Shortest idea (in characters, after trimming) worth sending to a backend.
pub const MIN_IDEA_CHARS: usize = 3;

/// Instruction sent as the system message on every attempt.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert prompt engineer. Convert the user's simple idea into a detailed, effective, and ready-to-use AI prompt in English. Keep it clear, specific, and optimized for best results.";

/// One backend model, identified by its provider model name.
///
/// Its position in the [`BackendRegistry`](crate::engine::BackendRegistry)
/// is its preference rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendSpec {
    model: String,
}

impl BackendSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.model)
    }
}

/// A single message in the outbound conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Sampling parameters applied to every attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// The uniform generation request for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    idea: String,
    system_instruction: &'static str,
    sampling: SamplingParams,
}

impl GenerationRequest {
    /// Build a request for an idea. Surrounding whitespace is trimmed; the
    /// minimum length is enforced by the caller before this point.
    pub fn new(idea: &str, sampling: SamplingParams) -> Self {
        Self {
            idea: idea.trim().to_string(),
            system_instruction: SYSTEM_INSTRUCTION,
            sampling,
        }
    }

    pub fn idea(&self) -> &str {
        &self.idea
    }

    pub fn system_instruction(&self) -> &str {
        self.system_instruction
    }

    pub fn sampling(&self) -> SamplingParams {
        self.sampling
    }
}

/// Check caller input and return the trimmed idea.
pub fn validate_idea(idea: Option<&str>) -> Result<&str, ValidationError> {
    let idea = idea
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .ok_or(ValidationError::Missing)?;
    let len = idea.chars().count();
    if len < MIN_IDEA_CHARS {
        return Err(ValidationError::TooShort {
            min: MIN_IDEA_CHARS,
            len,
        });
    }
    Ok(idea)
}

/// Chat-completions request body for one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Shape the request into the payload `backend` expects.
pub fn build_payload(request: &GenerationRequest, backend: &BackendSpec) -> CompletionPayload {
    CompletionPayload {
        model: backend.model().to_string(),
        messages: vec![
            ChatMessage::system(request.system_instruction()),
            ChatMessage::user(&format!("User idea: {}", request.idea())),
        ],
        max_tokens: request.sampling.max_tokens,
        temperature: request.sampling.temperature,
    }
}

/// Caller identity forwarded to backends on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub referer: String,
}

impl CallerContext {
    pub fn new(referer: impl Into<String>) -> Self {
        Self {
            referer: referer.into(),
        }
    }
}
