//! Chat and model status handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::CurrentSession;
use crate::api::error::{ApiError, EMPTY_MESSAGE};
use crate::app::AppState;
use crate::types::message::ResponseSource;
use crate::types::model::{ModelStatus, MODEL_DISPLAY_NAME};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    /// Display name of whatever produced `response`
    pub model: &'static str,
    pub source: ResponseSource,
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    session: CurrentSession,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest(EMPTY_MESSAGE.to_string()));
    }

    tracing::debug!("Chat request from user {} ({} chars)", session.user_pk, message.chars().count());
    let result = state.facade.generate_response(message).await;

    Ok(Json(ChatResponse {
        success: true,
        response: result.text,
        model: match result.source {
            ResponseSource::Model => MODEL_DISPLAY_NAME,
            ResponseSource::Fallback => "Fallback",
        },
        source: result.source,
    }))
}

/// `GET /api/model-status`
pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.facade.status())
}
