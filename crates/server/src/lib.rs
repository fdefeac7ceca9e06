//! trialqa-server library crate
//!
//! Exposes `build_app`, `build_state` and the model and gateway seams for
//! integration tests. The actual binary entrypoint is in `main.rs`.

pub mod ai;
pub mod config;
pub mod error;
pub mod gateway;
mod middleware;
mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::{Extension, Router, middleware as axum_mw, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trialqa_core::{PromptSet, TermNormalizer};

use ai::{Assistant, ClaudeClient, LanguageModel};
use config::{Config, PipelineConfig};
use error::{AppError, StartupError};
use gateway::{SelectAiGateway, SqlGateway};
use middleware::ApiKeyAuth;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// `None` until both a language model and a gateway are configured
    pub assistant: Option<Arc<Assistant>>,
    pub gateway: Option<Arc<dyn SqlGateway>>,
}

impl AppState {
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        gateway: Option<Arc<dyn SqlGateway>>,
        normalizer: Arc<TermNormalizer>,
        prompts: &PromptSet,
        settings: PipelineConfig,
    ) -> Self {
        let assistant = match (model, &gateway) {
            (Some(model), Some(gateway)) => Some(Arc::new(Assistant::new(
                model,
                gateway.clone(),
                normalizer,
                prompts,
                settings,
            ))),
            _ => None,
        };
        Self { assistant, gateway }
    }

    pub(crate) fn assistant(&self) -> Result<&Assistant, AppError> {
        match (&self.assistant, &self.gateway) {
            (Some(assistant), _) => Ok(assistant.as_ref()),
            (None, None) => Err(AppError::ServiceUnavailable(
                "SQL gateway not configured (set ORDS_BASE_URL)".to_string(),
            )),
            (None, Some(_)) => Err(AppError::ServiceUnavailable(
                "Language model not configured (set ANTHROPIC_API_KEY)".to_string(),
            )),
        }
    }
}

fn read_file(path: &Path) -> Result<String, StartupError> {
    std::fs::read_to_string(path).map_err(|source| StartupError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the handler state from configuration.
///
/// Loads the term dictionary and prompt templates (built-in unless a path is
/// configured) and creates the Claude client and the Select AI gateway when
/// their settings are present.
pub fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let normalizer = match &config.term_dictionary_path {
        Some(path) => TermNormalizer::from_dictionary(&read_file(path)?)?,
        None => TermNormalizer::builtin()?,
    };
    let prompts = match &config.prompt_dir {
        Some(dir) => PromptSet::load_dir(dir)?,
        None => PromptSet::builtin()?,
    };

    let model: Option<Arc<dyn LanguageModel>> = match &config.anthropic_api_key {
        Some(key) => Some(Arc::new(ClaudeClient::new(&config.llm, key.clone())?)),
        None => None,
    };
    let gateway: Option<Arc<dyn SqlGateway>> = match &config.database.ords_base_url {
        Some(url) => Some(Arc::new(SelectAiGateway::new(
            url,
            &config.database,
            config.pipeline.result_char_limit,
        )?)),
        None => None,
    };

    tracing::info!(
        terms = normalizer.entries().len(),
        prompt_dir = ?config.prompt_dir,
        max_iterations = config.pipeline.max_iterations,
        judge_enabled = config.pipeline.judge_enabled,
        "Assistant configured"
    );

    Ok(AppState::new(
        model,
        gateway,
        Arc::new(normalizer),
        &prompts,
        config.pipeline.clone(),
    ))
}

/// Build the full application router with all routes and middleware.
///
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a TCP port.
pub fn build_app(state: AppState, config: &Config) -> Router {
    let auth = ApiKeyAuth::new(config.api_key.clone());
    let rate_limiter = middleware::create_rate_limiter(config.rate_limit_rps);

    // Protected routes (require auth)
    let api_routes = Router::new()
        .nest("/api", routes::api_routes())
        .layer(axum_mw::from_fn(middleware::auth::auth_middleware))
        .layer(Extension(auth))
        .layer(axum_mw::from_fn(middleware::rate_limit_middleware))
        .layer(Extension(rate_limiter));

    // Install Prometheus metrics recorder.
    // build_recorder() + set_global_recorder() so repeated calls (as in
    // integration tests) keep the first recorder and still get a handle.
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus_handle = recorder.handle();
    let _ = metrics::set_global_recorder(recorder);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(routes::chat::index))
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .layer(Extension(prometheus_handle));

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(axum_mw::from_fn(middleware::audit_middleware))
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_mw::from_fn(middleware::metrics_middleware))
}
