//! Response extraction for chat-completions bodies.
//!
//! Generated text lives at `choices[0].message.content`. Anything else
//! (missing field, non-string, blank string) is an
//! [`AttemptError::EmptyContent`], never a success.

use serde_json::Value;

use crate::error::AttemptError;

/// Pull the trimmed generated text out of a response body.
pub fn extract_text(body: &Value) -> Result<String, AttemptError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| AttemptError::EmptyContent("no choices[0].message.content".into()))?;

    let text = content
        .as_str()
        .ok_or_else(|| AttemptError::EmptyContent("content is not a string".into()))?
        .trim();

    if text.is_empty() {
        return Err(AttemptError::EmptyContent("content is blank".into()));
    }

    Ok(text.to_string())
}

/// Parse a raw success body. A body that is not JSON counts as malformed
/// content, not as a transport failure.
pub fn parse_body(raw: &str) -> Result<Value, AttemptError> {
    serde_json::from_str(raw)
        .map_err(|e| AttemptError::EmptyContent(format!("malformed body: {}", e)))
}
