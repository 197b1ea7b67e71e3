//! HTTP boundary for the responder.
//!
//! Exposes `POST /api/prompt` (chat endpoint) and `GET /health`. The prompt
//! handler validates the payload shape, hands the latest user message to the
//! [`Responder`](crate::matcher::Responder), and wraps the reply in the
//! response envelope. Request validation happens before the matcher is ever
//! invoked; matcher failures come back as a 500 envelope.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::config::KotaeConfig;
use crate::corpus::Corpus;
use crate::embedding;
use crate::matcher::Responder;

#[derive(Clone)]
pub struct AppState {
    responder: Arc<Responder>,
}

impl AppState {
    pub fn new(responder: Arc<Responder>) -> Self {
        Self { responder }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/prompt", post(prompt))
        .route("/health", get(health))
        .with_state(state)
}

/// Start the HTTP server. The corpus embedding matrix stays lazy — the first
/// prompt request triggers the one-time batch embed.
pub async fn serve(config: KotaeConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting kotae server");

    let corpus = Corpus::load(config.resolved_corpus_path())?;
    let provider: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    tracing::info!("embedding provider ready");

    let responder = Arc::new(Responder::new(corpus, provider, &config.matcher));
    let router = build_router(AppState::new(responder));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}/api/prompt");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down server");
        })
        .await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "corpus_entries": state.responder.corpus().len(),
    }))
}

async fn prompt(State(state): State<AppState>, body: String) -> (StatusCode, Json<Value>) {
    // Parse by hand rather than via the Json extractor so an unparseable
    // body still gets our error envelope, not the framework's plaintext.
    let payload: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(err) => return error_envelope(&format!("invalid JSON body: {err}")),
    };

    let message = match extract_last_message(&payload) {
        Ok(content) => content.to_string(),
        Err(reason) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": reason })));
        }
    };

    match state.responder.respond(&message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(json!({
                "message": reply,
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "status": "success",
            })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "prompt handling failed");
            error_envelope(&err.to_string())
        }
    }
}

fn error_envelope(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "message": message,
            "status": "error",
        })),
    )
}

/// Validate the payload shape and pull out the latest user message.
///
/// `messages` must be a non-empty array, and the last element must carry a
/// non-empty string `content`. The body is taken as raw JSON rather than a
/// typed extractor so malformed shapes produce our error envelope instead of
/// the framework's.
fn extract_last_message(body: &Value) -> Result<&str, &'static str> {
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty())
        .ok_or("Invalid messages format")?;

    let content = messages
        .last()
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or("Invalid message content")?;

    Ok(content)
}
