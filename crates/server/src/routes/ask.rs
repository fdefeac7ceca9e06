//! Question answering endpoint

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use trialqa_core::Answer;

use crate::AppState;
use crate::error::AppError;

/// Request body for `/api/ask`
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// POST /api/ask - answer a question and return the full outcome
pub async fn ask(
    State(state): State<AppState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let assistant = state.assistant()?;

    let answer = assistant.ask(&body.question).await?;
    Ok(Json(answer))
}
