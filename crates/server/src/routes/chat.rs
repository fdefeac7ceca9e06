//! Chat page and its backing endpoint

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Html,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

const CHAT_PAGE: &str = include_str!("../../assets/chat.html");

/// A previous exchange shown in the chat window
#[derive(Debug, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Request body for chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Display history; every message is answered on its own
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Response body for chat
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub accepted: bool,
    pub iterations: u32,
    pub query_id: Uuid,
}

/// GET / - the chat page
pub async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// POST /api/chat - answer one chat message
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let assistant = state.assistant()?;

    tracing::info!(
        message = %body.message,
        history_len = body.history.len(),
        previous_user_turns = body.history.iter().filter(|t| t.role == "user").count(),
        "Chat request"
    );

    let answer = assistant.ask(&body.message).await?;
    Ok(Json(ChatResponse {
        response: answer.display_text(),
        accepted: answer.accepted,
        iterations: answer.iterations,
        query_id: answer.query_id,
    }))
}
