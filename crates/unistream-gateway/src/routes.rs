//! HTTP routes and handlers

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use crate::keys::KeyStore;
use crate::model_store::{ModelStore, StoreError};
use unistream_core::{ChatMessage, Role};
use unistream_providers::{ChatService, ModelEntry};

const MAX_MESSAGES: usize = 100;
const MAX_CONTENT_CHARS: usize = 10_000;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Streaming chat façade
    pub service: Arc<ChatService>,

    /// Write side of the models file
    pub models: Arc<ModelStore>,

    /// Caller API-key storage
    pub keys: Arc<KeyStore>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/models", get(list_model_ids).post(add_model))
        .route("/api/models/list", get(list_model_entries))
        .route(
            "/api/models/:id",
            get(get_model).put(update_model).delete(delete_model),
        )
        .route("/api/config/load", get(load_keys))
        .route("/api/config/save", post(save_keys))
        .route("/api/chat", post(chat))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .fallback(fallback)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

// =============================================================================
// Chat streaming
// =============================================================================

/// Chat request body
#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<IncomingMessage>,
    #[serde(default)]
    api_keys: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: String,
    content: String,
}

/// Validate request shape before the streaming core is invoked.
///
/// The core assumes well-formed input; everything rejected here never
/// reaches it.
fn validate(req: &ChatRequest, known_models: &[String]) -> Result<Vec<ChatMessage>, String> {
    if req.model.is_empty() {
        return Err("missing model".to_string());
    }
    if req.messages.is_empty() {
        return Err("missing messages".to_string());
    }
    if req.messages.len() > MAX_MESSAGES {
        return Err(format!("too many messages (max {MAX_MESSAGES})"));
    }

    let mut messages = Vec::with_capacity(req.messages.len());
    for (i, msg) in req.messages.iter().enumerate() {
        let role = match msg.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            other => return Err(format!("invalid role at index {i}: {other}")),
        };
        if msg.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(format!(
                "message at index {i} too long (max {MAX_CONTENT_CHARS} characters)"
            ));
        }
        messages.push(ChatMessage::new(role, msg.content.clone()));
    }

    if !known_models.iter().any(|m| m == &req.model) {
        return Err(format!("invalid model: {}", req.model));
    }
    Ok(messages)
}

/// Streaming chat handler.
///
/// The fragment stream is forwarded as a chunked plain-text body; errors
/// after the first byte arrive in-band as `Error: ...` text.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    metrics::counter!("unistream_requests_total", "endpoint" => "chat").increment(1);

    let known = state.service.model_ids();
    let messages = validate(&req, &known).map_err(|message| {
        warn!(model = %req.model, "rejected chat request: {message}");
        AppError::InvalidRequest(message)
    })?;
    info!(model = %req.model, messages = messages.len(), "chat request validated");

    let body = state
        .service
        .stream_chat(&req.model, &messages, &req.api_keys)
        .map(|fragment| Ok::<_, Infallible>(fragment.to_string()));

    let mut response = Response::new(Body::from_stream(body));
    response.headers_mut().insert(
        "Content-Type",
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-cache"));
    Ok(response)
}

// =============================================================================
// Model management
// =============================================================================

async fn list_model_ids(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.service.model_ids())
}

async fn list_model_entries(State(state): State<AppState>) -> Json<serde_json::Value> {
    let file = state.models.load();
    Json(json!({
        "success": true,
        "models": file.models,
        "api_types": file.api_types,
    }))
}

async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.models.get(&id) {
        Some(model) => Ok(Json(json!({"success": true, "model": model}))),
        None => Err(StoreError::NotFound.into()),
    }
}

fn validate_entry(entry: &ModelEntry) -> Result<(), AppError> {
    for (field, value) in [
        ("id", &entry.id),
        ("name", &entry.name),
        ("model", &entry.model),
        ("api_key_name", &entry.api_key_name),
    ] {
        if value.is_empty() {
            return Err(AppError::InvalidRequest(format!(
                "missing required field: {field}"
            )));
        }
    }
    Ok(())
}

async fn add_model(
    State(state): State<AppState>,
    Json(entry): Json<ModelEntry>,
) -> Result<Json<serde_json::Value>, AppError> {
    metrics::counter!("unistream_requests_total", "endpoint" => "models").increment(1);
    validate_entry(&entry)?;
    let model = state.models.add(entry)?;
    Ok(Json(json!({
        "success": true,
        "message": "model added",
        "model": model,
    })))
}

async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(entry): Json<ModelEntry>,
) -> Result<Json<serde_json::Value>, AppError> {
    validate_entry(&entry)?;
    let model = state.models.update(&id, entry)?;
    Ok(Json(json!({
        "success": true,
        "message": "model updated",
        "model": model,
    })))
}

async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.models.delete(&id)?;
    Ok(Json(json!({"success": true, "message": "model deleted"})))
}

// =============================================================================
// API-key storage
// =============================================================================

async fn load_keys(State(state): State<AppState>) -> Json<HashMap<String, String>> {
    Json(state.keys.load())
}

async fn save_keys(
    State(state): State<AppState>,
    Json(keys): Json<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .keys
        .save(keys)
        .map_err(|e| AppError::Internal(format!("failed to save api keys: {e}")))?;
    Ok(Json(json!({"success": true, "message": "configuration saved"})))
}

// =============================================================================
// Error handling
// =============================================================================

#[derive(Debug)]
enum AppError {
    InvalidRequest(String),
    Store(StoreError),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "model not found".to_string())
            }
            AppError::Store(err @ (StoreError::Duplicate | StoreError::BuiltIn)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::Store(StoreError::Io(err)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = json!({
            "error": {
                "message": message,
                "type": "invalid_request_error",
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str, messages: Vec<IncomingMessage>) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages,
            api_keys: HashMap::new(),
        }
    }

    fn msg(role: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    fn known() -> Vec<String> {
        vec!["google".to_string(), "deepseek".to_string()]
    }

    #[test]
    fn test_valid_request_converts_roles() {
        let req = request("google", vec![msg("system", "s"), msg("user", "hi")]);
        let messages = validate(&req, &known()).unwrap();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let req = request("nope", vec![msg("user", "hi")]);
        assert!(validate(&req, &known()).unwrap_err().contains("invalid model"));
    }

    #[test]
    fn test_too_many_messages_rejected() {
        let messages = (0..MAX_MESSAGES + 1).map(|_| msg("user", "hi")).collect();
        let req = request("google", messages);
        assert!(validate(&req, &known())
            .unwrap_err()
            .contains("too many messages"));
    }

    #[test]
    fn test_bad_role_rejected() {
        let req = request("google", vec![msg("wizard", "hi")]);
        assert!(validate(&req, &known()).unwrap_err().contains("invalid role"));
    }

    #[test]
    fn test_overlong_content_rejected() {
        let req = request("google", vec![msg("user", &"x".repeat(MAX_CONTENT_CHARS + 1))]);
        assert!(validate(&req, &known()).unwrap_err().contains("too long"));
    }

    #[test]
    fn test_content_limit_counts_characters_not_bytes() {
        // multi-byte characters: exactly at the limit must pass
        let req = request("google", vec![msg("user", &"宇".repeat(MAX_CONTENT_CHARS))]);
        assert!(validate(&req, &known()).is_ok());
    }

    #[test]
    fn test_empty_messages_rejected() {
        let req = request("google", Vec::new());
        assert!(validate(&req, &known()).unwrap_err().contains("missing messages"));
    }
}
