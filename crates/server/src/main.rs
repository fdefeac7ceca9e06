//! trialqa-server: clinical trial question answering over Select AI.

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trialqa_server::AppState;
use trialqa_server::config::Config;
use trialqa_server::error::StartupError;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let (config, state) = match init() {
        Ok(ready) => ready,
        Err(err) => {
            tracing::error!(error = %err, "Startup failed");
            std::process::exit(1);
        }
    };
    let app = trialqa_server::build_app(state, &config);

    // Start server
    let addr: SocketAddr = config.bind_address.parse().expect("Invalid bind address");
    tracing::info!("Starting trialqa server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Load configuration and assemble the handler state
fn init() -> Result<(Config, AppState), StartupError> {
    let config = Config::from_env()?;

    if config.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("API key authentication disabled (no API_KEY env var)");
    }
    if config.anthropic_api_key.is_some() {
        tracing::info!(model = %config.llm.model, "Anthropic API key configured");
    } else {
        tracing::warn!("ANTHROPIC_API_KEY not set, question answering disabled");
    }
    match &config.database.ords_base_url {
        Some(url) => tracing::info!(
            ords = %url,
            schema = %config.database.schema,
            profile = %config.database.profile,
            "Select AI gateway configured"
        ),
        None => tracing::warn!("ORDS_BASE_URL not set, question answering disabled"),
    }
    tracing::info!("Rate limiting: {} requests/second", config.rate_limit_rps);

    let state = trialqa_server::build_state(&config)?;
    Ok((config, state))
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
