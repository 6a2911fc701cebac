//! Fallback engine: tries ranked backends in order until one produces text.
//!
//! The dispatch loop is strictly sequential. For each backend in the
//! [`BackendRegistry`] it:
//! 1. Builds the payload from the shared [`GenerationRequest`]
//! 2. Sends it through the [`Transport`], bounded by the per-attempt timeout
//! 3. Extracts text from the response
//! 4. Returns on the first success, or records the failure and moves on
//!
//! When every backend fails the engine returns
//! [`EngineError::AllBackendsExhausted`] with one [`AttemptOutcome`] per
//! backend, in registry order. A caller deadline (a [`CancellationToken`])
//! aborts the in-flight call and stops the loop.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AttemptError, EngineError};
use crate::provider::extract::extract_text;
use crate::provider::types::{
    build_payload, BackendSpec, CallerContext, GenerationRequest, SamplingParams,
};
use crate::provider::Transport;

/// Free models tried by default, most preferred first.
pub const DEFAULT_MODELS: &[&str] = &[
    "deepseek/deepseek-r1",
    "meta-llama/llama-3-8b-instruct",
    "mistralai/mistral-7b-instruct",
    "gryphe/mythomax-l2-13b",
    "google/gemma-7b-it",
    "openchat/openchat-7b",
];

/// Time budget for a single backend attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ordered, read-only list of backends. Index 0 is the most preferred.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRegistry {
    backends: Vec<BackendSpec>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<BackendSpec>) -> Self {
        Self { backends }
    }

    pub fn from_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(models.into_iter().map(BackendSpec::new).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendSpec> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::from_models(DEFAULT_MODELS.iter().copied())
    }
}

/// What one backend attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    Success(String),
    Failure(AttemptError),
}

/// Record of one backend attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub backend: BackendSpec,
    pub elapsed: Duration,
    pub result: AttemptResult,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, AttemptResult::Success(_))
    }

    pub fn error(&self) -> Option<&AttemptError> {
        match &self.result {
            AttemptResult::Failure(e) => Some(e),
            AttemptResult::Success(_) => None,
        }
    }
}

/// A successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Extracted text of the winning backend.
    pub text: String,
    /// The earliest-ranked backend that succeeded.
    pub backend: BackendSpec,
    /// Every attempt made, ending with the winner.
    pub attempts: Vec<AttemptOutcome>,
}

pub struct FallbackEngine {
    registry: BackendRegistry,
    transport: Box<dyn Transport>,
    attempt_timeout: Duration,
    sampling: SamplingParams,
}

impl FallbackEngine {
    pub fn new(registry: BackendRegistry, transport: Box<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            sampling: SamplingParams::default(),
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Turn an idea into a prompt. `cancel` is the caller's deadline.
    pub async fn generate(
        &self,
        idea: &str,
        referer: &str,
        cancel: &CancellationToken,
    ) -> Result<Generation, EngineError> {
        let request = GenerationRequest::new(idea, self.sampling);
        let caller = CallerContext::new(referer);
        self.dispatch(&request, &caller, cancel).await
    }

    /// Like [`generate`](Self::generate), with the deadline expressed as a
    /// total time budget for the whole invocation.
    pub async fn generate_within(
        &self,
        idea: &str,
        referer: &str,
        budget: Duration,
    ) -> Result<Generation, EngineError> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                cancel.cancel();
            })
        };

        let result = self.generate(idea, referer, &cancel).await;
        timer.abort();
        result
    }

    /// Run the dispatch loop for an already-built request.
    pub async fn dispatch(
        &self,
        request: &GenerationRequest,
        caller: &CallerContext,
        cancel: &CancellationToken,
    ) -> Result<Generation, EngineError> {
        if self.registry.is_empty() {
            return Err(EngineError::Configuration(
                "backend registry is empty".into(),
            ));
        }

        let mut attempts = Vec::with_capacity(self.registry.len());

        for (rank, backend) in self.registry.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    attempts = attempts.len(),
                    "Deadline reached, not starting further attempts"
                );
                return Err(EngineError::DeadlineExceeded { attempts });
            }

            let payload = build_payload(request, backend);
            debug!(backend = %backend, rank, via = self.transport.name(), "Attempting backend");

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AttemptError::Cancelled),
                res = tokio::time::timeout(
                    self.attempt_timeout,
                    self.transport.send(&payload, caller),
                ) => match res {
                    Ok(Ok(body)) => extract_text(&body),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(AttemptError::Timeout(self.attempt_timeout)),
                },
            };
            let elapsed = started.elapsed();

            match result {
                Ok(text) => {
                    info!(
                        backend = %backend,
                        rank,
                        elapsed_ms = elapsed.as_millis() as u64,
                        chars = text.chars().count(),
                        "Backend produced prompt"
                    );
                    attempts.push(AttemptOutcome {
                        backend: backend.clone(),
                        elapsed,
                        result: AttemptResult::Success(text.clone()),
                    });
                    return Ok(Generation {
                        text,
                        backend: backend.clone(),
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(
                        backend = %backend,
                        rank,
                        kind = e.kind(),
                        class = e.class().as_str(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "Backend attempt failed"
                    );
                    let cancelled = matches!(e, AttemptError::Cancelled);
                    attempts.push(AttemptOutcome {
                        backend: backend.clone(),
                        elapsed,
                        result: AttemptResult::Failure(e),
                    });
                    if cancelled {
                        return Err(EngineError::DeadlineExceeded { attempts });
                    }
                }
            }
        }

        Err(EngineError::AllBackendsExhausted { attempts })
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::testing::{reply, Behavior, ScriptedTransport};
    use super::*;
    use crate::error::FailureClass;

    const REFERER: &str = "https://prompt-dost.vercel.app";

    fn engine(models: &[&str], transport: &ScriptedTransport) -> FallbackEngine {
        FallbackEngine::new(
            BackendRegistry::from_models(models.iter().copied()),
            Box::new(transport.clone()),
        )
        .with_attempt_timeout(Duration::from_millis(200))
    }

    fn kinds(attempts: &[AttemptOutcome]) -> Vec<&'static str> {
        attempts
            .iter()
            .map(|a| a.error().map(|e| e.kind()).unwrap_or("ok"))
            .collect()
    }

    #[test]
    fn test_default_registry_order() {
        let registry = BackendRegistry::default();
        assert_eq!(registry.len(), 6);
        let models: Vec<&str> = registry.iter().map(|b| b.model()).collect();
        assert_eq!(models[0], "deepseek/deepseek-r1");
        assert_eq!(models[5], "openchat/openchat-7b");
    }

    #[tokio::test]
    async fn test_first_backend_wins() {
        let transport = ScriptedTransport::new()
            .on("a", reply("  Prompt from A  "))
            .on("b", reply("Prompt from B"));
        let engine = engine(&["a", "b"], &transport);

        let gen = engine
            .generate("write a poem", REFERER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(gen.text, "Prompt from A");
        assert_eq!(gen.backend.model(), "a");
        assert_eq!(gen.attempts.len(), 1);
        assert_eq!(transport.contacted(), vec!["a"]);
        assert_eq!(transport.referers(), vec![REFERER]);
    }

    #[tokio::test]
    async fn test_falls_through_to_second_backend() {
        let b_text = "Write a detailed short story about dragons including setting and tone";
        let transport = ScriptedTransport::new()
            .on("a", Behavior::Stall)
            .on("b", reply(b_text))
            .on("c", reply("never used"));
        let engine = engine(&["a", "b", "c"], &transport);

        let gen = engine
            .generate("a story about dragons", REFERER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(gen.text, b_text);
        assert_eq!(kinds(&gen.attempts), vec!["timeout", "ok"]);
        assert_eq!(gen.attempts[0].backend.model(), "a");
        assert_eq!(gen.attempts[1].backend.model(), "b");
        assert_eq!(transport.contacted(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_all_backends_exhausted_keeps_history_in_order() {
        let transport = ScriptedTransport::new()
            .on("a", Behavior::Fail(AttemptError::Transport("connection refused".into())))
            .on("b", Behavior::Fail(AttemptError::Rejected {
                status: 429,
                message: "rate limited".into(),
            }))
            .on("c", reply("   "))
            .on("d", Behavior::Reply(json!({"choices": []})))
            .on("e", Behavior::Stall);
        let engine = engine(&["a", "b", "c", "d", "e"], &transport);

        let err = engine
            .generate("idea", REFERER, &CancellationToken::new())
            .await
            .unwrap_err();

        let attempts = match &err {
            EngineError::AllBackendsExhausted { attempts } => attempts,
            other => panic!("unexpected error: {other:?}"),
        };
        let models: Vec<&str> = attempts.iter().map(|a| a.backend.model()).collect();
        assert_eq!(models, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(
            kinds(attempts),
            vec!["transport", "rejected", "empty_content", "empty_content", "timeout"]
        );

        let classes: Vec<FailureClass> =
            attempts.iter().map(|a| a.error().unwrap().class()).collect();
        assert_eq!(
            classes,
            vec![
                FailureClass::Unreachable,
                FailureClass::Unreachable,
                FailureClass::NoUsableText,
                FailureClass::NoUsableText,
                FailureClass::Unreachable,
            ]
        );
        assert!(err.summary().contains("c: empty_content (no_usable_text)"));
    }

    #[tokio::test]
    async fn test_stalling_backend_bounded_by_timeout() {
        let transport = ScriptedTransport::new().on("a", Behavior::Stall);
        let engine = engine(&["a"], &transport).with_attempt_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let err = engine
            .generate("idea", REFERER, &CancellationToken::new())
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        assert_eq!(err.attempts().len(), 1);
        assert_eq!(
            err.attempts()[0].error(),
            Some(&AttemptError::Timeout(Duration::from_millis(100)))
        );
    }

    #[tokio::test]
    async fn test_repeated_invocations_are_identical() {
        let transport = ScriptedTransport::new()
            .on("a", Behavior::Fail(AttemptError::Transport("reset".into())))
            .on("b", reply("   "))
            .on("c", reply("stable prompt"));
        let engine = engine(&["a", "b", "c"], &transport);

        let first = engine
            .generate("same idea", REFERER, &CancellationToken::new())
            .await
            .unwrap();
        let second = engine
            .generate("same idea", REFERER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(first.text, second.text);
        assert_eq!(kinds(&first.attempts), kinds(&second.attempts));
        assert_eq!(transport.contacted(), vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_registry_is_configuration_error() {
        let transport = ScriptedTransport::new();
        let engine = FallbackEngine::new(BackendRegistry::new(vec![]), Box::new(transport.clone()));

        let err = engine
            .generate("idea", REFERER, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.attempts().is_empty());
        assert!(transport.contacted().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancels_in_flight_attempt() {
        let transport = ScriptedTransport::new()
            .on("a", Behavior::Stall)
            .on("b", reply("too late"));
        let engine = engine(&["a", "b"], &transport).with_attempt_timeout(Duration::from_secs(30));

        let started = Instant::now();
        let err = engine
            .generate_within("idea", REFERER, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match &err {
            EngineError::DeadlineExceeded { attempts } => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].error(), Some(&AttemptError::Cancelled));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.contacted(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_attempts() {
        let transport = ScriptedTransport::new().on("a", reply("unused"));
        let engine = engine(&["a"], &transport);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine.generate("idea", REFERER, &cancel).await.unwrap_err();

        assert!(matches!(err, EngineError::DeadlineExceeded { ref attempts } if attempts.is_empty()));
        assert!(transport.contacted().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_invocations_share_engine() {
        let transport = ScriptedTransport::new()
            .on("a", Behavior::Fail(AttemptError::Transport("down".into())))
            .on("b", reply("shared"));
        let engine = Arc::new(engine(&["a", "b"], &transport));

        let (c1, c2) = (CancellationToken::new(), CancellationToken::new());
        let (x, y) = tokio::join!(
            engine.generate("first idea", REFERER, &c1),
            engine.generate("second idea", REFERER, &c2),
        );

        assert_eq!(x.unwrap().text, "shared");
        assert_eq!(y.unwrap().text, "shared");
        assert_eq!(transport.contacted().len(), 4);
    }
}
