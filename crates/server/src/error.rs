//! Application error handling

use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::ai::{AssistantError, LlmError};
use crate::config::ConfigError;
use crate::gateway::GatewayError;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    TooManyRequests(String),
    BadGateway(String),
    GatewayTimeout(String),
    ServiceUnavailable(String),
    #[allow(dead_code)]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl AppError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", msg)
            }
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            AppError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", msg)
            }
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error) = self.parts();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), kind, error = %error, "Request failed");
        }
        (status, Json(ErrorBody { error, kind })).into_response()
    }
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::EmptyQuestion => AppError::BadRequest(err.to_string()),
            AssistantError::GatewayTimeout => AppError::GatewayTimeout(err.to_string()),
            AssistantError::GatewayUnavailable(_) | AssistantError::Summarization(_) => {
                AppError::BadGateway(err.to_string())
            }
        }
    }
}

/// Failures while assembling the application at start-up
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] trialqa_core::CoreError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create language model client: {0}")]
    Llm(#[from] LlmError),

    #[error("Failed to create SQL gateway: {0}")]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn invalid_config_is_a_startup_error() {
        let load = || -> Result<Config, StartupError> {
            Ok(Config::from_lookup(|key| {
                (key == "MAX_ITERATIONS").then(|| "0".to_string())
            })?)
        };
        let err = load().unwrap_err();
        assert!(matches!(
            err,
            StartupError::Config(ConfigError::Invalid { key: "MAX_ITERATIONS", .. })
        ));
        assert!(err.to_string().contains("MAX_ITERATIONS"));
    }

    #[test]
    fn assistant_errors_map_to_statuses() {
        let status = |e: AssistantError| AppError::from(e).parts().0;
        assert_eq!(status(AssistantError::EmptyQuestion), StatusCode::BAD_REQUEST);
        assert_eq!(status(AssistantError::GatewayTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status(AssistantError::GatewayUnavailable(GatewayError::Transport("refused".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(AssistantError::Summarization(LlmError::EmptyResponse)),
            StatusCode::BAD_GATEWAY
        );
    }
}
