//! Error model for the fallback engine and its callers.
//!
//! [`AttemptError`] describes why a single backend attempt failed. It never
//! leaves the dispatch loop on its own; it is recorded in an
//! [`AttemptOutcome`](crate::engine::AttemptOutcome) and the loop advances.
//! Only [`EngineError`] propagates out of the engine.

use std::time::Duration;

use thiserror::Error;

use crate::engine::AttemptOutcome;

/// Why one backend attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// Network failure before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The attempt exceeded its time budget and was aborted.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The caller's deadline fired while this attempt was in flight.
    #[error("cancelled by caller deadline")]
    Cancelled,

    /// The backend answered with a non-success status.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered but no usable text could be extracted.
    #[error("empty content: {0}")]
    EmptyContent(String),
}

/// Coarse classification kept per attempt for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Backend was unreachable, too slow, or refused the request.
    Unreachable,
    /// Backend answered but returned nothing usable.
    NoUsableText,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::NoUsableText => "no_usable_text",
        }
    }
}

impl AttemptError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::Cancelled | Self::Rejected { .. } => {
                FailureClass::Unreachable
            }
            Self::EmptyContent(_) => FailureClass::NoUsableText,
        }
    }

    /// Short stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Rejected { .. } => "rejected",
            Self::EmptyContent(_) => "empty_content",
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Terminal failures of one engine invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine cannot dispatch at all (e.g. empty registry).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every backend in the registry was tried and none produced text.
    #[error("all {} backends failed", .attempts.len())]
    AllBackendsExhausted { attempts: Vec<AttemptOutcome> },

    /// The caller's deadline fired before any backend succeeded.
    #[error("deadline exceeded after {} attempt(s)", .attempts.len())]
    DeadlineExceeded { attempts: Vec<AttemptOutcome> },
}

impl EngineError {
    /// Attempt history recorded before the engine gave up.
    pub fn attempts(&self) -> &[AttemptOutcome] {
        match self {
            Self::Configuration(_) => &[],
            Self::AllBackendsExhausted { attempts } | Self::DeadlineExceeded { attempts } => {
                attempts
            }
        }
    }

    /// One-line summary of every failed attempt, for logs.
    pub fn summary(&self) -> String {
        let attempts = self.attempts();
        if attempts.is_empty() {
            return self.to_string();
        }
        let parts: Vec<String> = attempts
            .iter()
            .map(|a| match a.error() {
                Some(e) => format!("{}: {} ({})", a.backend, e.kind(), e.class().as_str()),
                None => format!("{}: ok", a.backend),
            })
            .collect();
        format!("{} [{}]", self, parts.join(", "))
    }
}

/// Rejection of caller input before the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("idea is missing")]
    Missing,

    #[error("idea must be at least {min} characters (got {len})")]
    TooShort { min: usize, len: usize },
}
