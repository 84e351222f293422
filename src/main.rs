//! # Conversa Backend - Main Application Entry Point
//!
//! HTTP relay between a browser chat frontend and hosted models:
//! speech-to-text, text generation with a short conversation window, and
//! optional text-to-speech.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, `config.toml`, environment) and credentials
//! - **conversation**: Turns, the history log, context rendering and the chat pipeline
//! - **adapters**: Hosted model clients (Gemini, OpenAI-compatible) and response formatting
//! - **session**: Session ids, cookies, and the memory / filesystem session stores
//! - **state**: Shared application state and request metrics
//! - **handlers**: HTTP request handlers for the API endpoints
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics collection
//! - **error**: HTTP error type and JSON error responses

mod adapters;
mod config;
mod conversation;
mod error;
mod handlers;
mod health;
mod middleware;
mod session;
mod state;

#[cfg(test)]
mod test_support;

use actix_cors::Cors;
use actix_web::{http::Method, middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::{AppConfig, Credentials};
use session::SessionStore;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;
    let credentials = Credentials::from_env(&config)?;

    info!("Starting conversa-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let app_state = AppState::build(config.clone(), &credentials).await?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let sweeper = spawn_session_sweeper(
        app_state.chat.store().clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
    );

    info!("Starting HTTP server on {}", bind_addr);

    let cors_config = config.cors.clone();
    let session_cookie = app_state.session_cookie.name().to_string();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(build_cors(&cors_config))
            .wrap(Logger::default())
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging::new(session_cookie.clone()))
            .configure(handlers::configure)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    sweeper.abort();
    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize `tracing` from `RUST_LOG`, defaulting to
/// `conversa_backend=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conversa_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// An empty origin list allows any origin without credentials. A listed origin
/// set enables credentials so the session cookie survives cross-site requests.
fn build_cors(config: &config::CorsConfig) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec![Method::GET, Method::POST, Method::DELETE])
        .allow_any_header()
        .max_age(config.max_age_secs);

    if config.allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }

    config
        .allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
        .supports_credentials()
}

/// Periodically drop sessions idle past the configured timeout.
fn spawn_session_sweeper(store: Arc<dyn SessionStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, backend = store.backend_name(), "Expired sessions purged"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    })
}

/// Resolves on SIGTERM or SIGINT (Ctrl+C).
#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers ({}), falling back to Ctrl+C", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
