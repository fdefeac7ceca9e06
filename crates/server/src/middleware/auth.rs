//! API key authentication for `/api` routes

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// API Key authentication state
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Option<String>,
}

impl ApiKeyAuth {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    /// True when no key is configured or the request carries the right one
    pub fn allows(&self, headers: &HeaderMap) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|provided| provided == expected),
        }
    }
}

/// Reject requests without a valid `X-API-Key` header
pub async fn auth_middleware(request: Request<Body>, next: Next) -> Response {
    let allowed = request
        .extensions()
        .get::<ApiKeyAuth>()
        .is_none_or(|auth| auth.allows(request.headers()));

    if !allowed {
        tracing::warn!(path = %request.uri().path(), "Rejected request with missing or invalid API key");
        return AppError::Unauthorized("Missing or invalid API key".to_string()).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn open_when_no_key_configured() {
        assert!(ApiKeyAuth::new(None).allows(&HeaderMap::new()));
    }

    #[test]
    fn checks_the_header() {
        let auth = ApiKeyAuth::new(Some("secret".into()));
        let mut headers = HeaderMap::new();
        assert!(!auth.allows(&headers));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(!auth.allows(&headers));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(auth.allows(&headers));
    }
}
