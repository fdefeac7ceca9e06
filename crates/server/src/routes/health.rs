//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn unhealthy(reason: String) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "unhealthy".to_string(),
            reason: Some(reason),
        }),
    )
}

/// GET /health - Check that the SQL service answers
pub async fn check(State(state): State<AppState>) -> impl IntoResponse {
    let Some(gateway) = state.gateway.as_ref() else {
        return unhealthy("SQL gateway not configured (set ORDS_BASE_URL)".to_string());
    };

    match gateway.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                reason: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check ping failed");
            unhealthy(format!("SQL gateway unreachable: {}", e))
        }
    }
}
