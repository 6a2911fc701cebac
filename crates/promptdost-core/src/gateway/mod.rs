//! HTTP gateway: the web-facing entry point to the fallback engine.
//!
//! Routes:
//! - `POST /api/generate`: `{ idea, referer? }` → `{ prompt }`
//! - `GET /api/history`: recorded prompts, newest first
//! - `DELETE /api/history`: clear recorded prompts
//! - `GET /health`
//!
//! Input is validated here, before the engine runs. Any engine failure is
//! collapsed into one localized message; the attempt history goes to the
//! log, not to the client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_REFERER;
use crate::engine::FallbackEngine;
use crate::history::HistoryStore;
use crate::locale::{Locale, Message};
use crate::provider::types::validate_idea;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<FallbackEngine>,
    history: Option<Arc<HistoryStore>>,
    deadline: Duration,
    default_referer: String,
    locale: Locale,
}

impl AppState {
    pub fn new(engine: Arc<FallbackEngine>, deadline: Duration) -> Self {
        Self {
            engine,
            history: None,
            deadline,
            default_referer: DEFAULT_REFERER.into(),
            locale: Locale::default(),
        }
    }

    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_default_referer(mut self, referer: impl Into<String>) -> Self {
        self.default_referer = referer.into();
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate_prompt))
        .route("/api/history", get(list_history).delete(clear_history))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway on `addr` until `shutdown` is cancelled.
pub async fn serve(state: AppState, addr: SocketAddr, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting HTTP gateway");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP gateway stopped");
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST /api/generate
async fn generate_prompt(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected unreadable request body");
            return error_response(StatusCode::BAD_REQUEST, state.locale.text(Message::IdeaTooShort));
        }
    };

    let idea = match validate_idea(body.get("idea").and_then(Value::as_str)) {
        Ok(idea) => idea.to_string(),
        Err(e) => {
            debug!(error = %e, "Rejected idea");
            return error_response(StatusCode::BAD_REQUEST, state.locale.text(Message::IdeaTooShort));
        }
    };

    let referer = body
        .get("referer")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(state.default_referer.as_str())
        .to_string();

    match state.engine.generate_within(&idea, &referer, state.deadline).await {
        Ok(generation) => {
            if let Some(history) = state.history.clone() {
                let prompt = generation.text.clone();
                let model = generation.backend.model().to_string();
                let recorded = tokio::task::spawn_blocking(move || {
                    history.record(&idea, &prompt, Some(&model))
                })
                .await;
                match recorded {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Failed to record history"),
                    Err(e) => error!(error = %e, "History task panicked"),
                }
            }
            Json(json!({ "prompt": generation.text })).into_response()
        }
        Err(e) => {
            warn!(error = %e.summary(), "Prompt generation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                state.locale.text(Message::AllBackendsBusy),
            )
        }
    }
}

/// GET /api/history
async fn list_history(State(state): State<AppState>) -> Response {
    let Some(history) = state.history else {
        return Json(json!({ "items": [] })).into_response();
    };
    match tokio::task::spawn_blocking(move || history.list()).await {
        Ok(items) => Json(json!({ "items": items })).into_response(),
        Err(e) => {
            error!(error = %e, "History task panicked");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                state.locale.text(Message::SomethingWentWrong),
            )
        }
    }
}

/// DELETE /api/history
async fn clear_history(State(state): State<AppState>) -> Response {
    let Some(history) = state.history else {
        return Json(json!({ "removed": 0 })).into_response();
    };
    match tokio::task::spawn_blocking(move || history.clear()).await {
        Ok(Ok(removed)) => Json(json!({ "removed": removed })).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to clear history");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                state.locale.text(Message::SomethingWentWrong),
            )
        }
        Err(e) => {
            error!(error = %e, "History task panicked");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                state.locale.text(Message::SomethingWentWrong),
            )
        }
    }
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backends": state.engine.registry().len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{reply, Behavior, ScriptedTransport};
    use crate::engine::BackendRegistry;
    use crate::error::AttemptError;
    use axum_test::TestServer;

    fn server(transport: &ScriptedTransport, models: &[&str]) -> TestServer {
        let engine = FallbackEngine::new(
            BackendRegistry::from_models(models.iter().copied()),
            Box::new(transport.clone()),
        )
        .with_attempt_timeout(Duration::from_millis(200));
        let state = AppState::new(Arc::new(engine), Duration::from_secs(2));
        TestServer::new(build_router(state)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_success() {
        let transport = ScriptedTransport::new()
            .on("a", Behavior::Fail(AttemptError::Transport("down".into())))
            .on("b", reply("Write a detailed short story about dragons"));
        let server = server(&transport, &["a", "b"]);

        let res = server
            .post("/api/generate")
            .json(&json!({ "idea": "  a story about dragons ", "referer": "https://example.app" }))
            .await;

        res.assert_status_ok();
        res.assert_json(&json!({ "prompt": "Write a detailed short story about dragons" }));
        assert_eq!(transport.referers(), vec!["https://example.app", "https://example.app"]);
    }

    #[tokio::test]
    async fn test_short_idea_rejected_before_engine() {
        let transport = ScriptedTransport::new().on("a", reply("unused"));
        let server = server(&transport, &["a"]);

        for body in [json!({ "idea": " ab " }), json!({}), json!({ "idea": 42 })] {
            let res = server.post("/api/generate").json(&body).await;
            res.assert_status(StatusCode::BAD_REQUEST);
            res.assert_json(&json!({ "error": "कृपया कम से कम 3 अक्षरों का विचार लिखें।" }));
        }
        assert!(transport.contacted().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_body_is_bad_request() {
        let transport = ScriptedTransport::new();
        let server = server(&transport, &["a"]);

        let res = server.post("/api/generate").text("{idea").await;
        res.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_exhaustion_maps_to_generic_error() {
        let transport = ScriptedTransport::new()
            .on("a", reply(""))
            .on("b", Behavior::Fail(AttemptError::Rejected {
                status: 502,
                message: "bad gateway".into(),
            }));
        let server = server(&transport, &["a", "b"]);

        let res = server
            .post("/api/generate")
            .json(&json!({ "idea": "a haiku about tea" }))
            .await;

        res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        res.assert_json(&json!({ "error": "सभी मॉडल्स व्यस्त हैं। कृपया बाद में प्रयास करें।" }));
        assert_eq!(transport.referers()[0], DEFAULT_REFERER);
    }

    #[tokio::test]
    async fn test_deadline_maps_to_generic_error() {
        let transport = ScriptedTransport::new().on("a", Behavior::Stall);
        let engine = FallbackEngine::new(BackendRegistry::from_models(["a"]), Box::new(transport.clone()))
            .with_attempt_timeout(Duration::from_secs(30));
        let state = AppState::new(Arc::new(engine), Duration::from_millis(100));
        let server = TestServer::new(build_router(state)).unwrap();

        let started = std::time::Instant::now();
        let res = server
            .post("/api/generate")
            .json(&json!({ "idea": "a haiku about tea" }))
            .await;

        res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        res.assert_json(&json!({ "error": "सभी मॉडल्स व्यस्त हैं। कृपया बाद में प्रयास करें।" }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.contacted(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_english_locale() {
        let transport = ScriptedTransport::new();
        let engine = FallbackEngine::new(BackendRegistry::default(), Box::new(transport));
        let state = AppState::new(Arc::new(engine), Duration::from_secs(1)).with_locale(Locale::English);
        let server = TestServer::new(build_router(state)).unwrap();

        let res = server.post("/api/generate").json(&json!({ "idea": "x" })).await;
        res.assert_json(&json!({ "error": "Please write an idea of at least 3 characters." }));
    }

    #[tokio::test]
    async fn test_history_recorded_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::new(dir.path().join("h.jsonl"), 10));
        let transport = ScriptedTransport::new().on("a", reply("A prompt"));
        let engine = FallbackEngine::new(BackendRegistry::from_models(["a"]), Box::new(transport));
        let state = AppState::new(Arc::new(engine), Duration::from_secs(2)).with_history(history);
        let server = TestServer::new(build_router(state)).unwrap();

        server
            .post("/api/generate")
            .json(&json!({ "idea": "tea poem" }))
            .await
            .assert_status_ok();

        let listed: Value = server.get("/api/history").await.json();
        assert_eq!(listed["items"][0]["idea"], "tea poem");
        assert_eq!(listed["items"][0]["prompt"], "A prompt");
        assert_eq!(listed["items"][0]["model"], "a");

        let cleared: Value = server.delete("/api/history").await.json();
        assert_eq!(cleared["removed"], 1);
    }

    #[tokio::test]
    async fn test_health() {
        let transport = ScriptedTransport::new();
        let server = server(&transport, &["a", "b", "c"]);

        let body: Value = server.get("/health").await.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backends"], 3);
    }
}
