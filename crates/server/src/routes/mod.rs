pub mod ask;
pub mod chat;
pub mod health;
pub mod metrics;

use axum::{Router, routing::post};

use crate::AppState;

/// Question answering routes, mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ask", post(ask::ask))
        .route("/chat", post(chat::chat))
}
