//! CinePrompt
//!
//! Single-binary service that turns a short story idea into a structured,
//! cinematic image-generation prompt:
//! 1. Loads API keys from the environment or a persisted interactive list
//! 2. Sends the story to Gemini with a fixed system instruction
//! 3. Rotates to the next key on quota or credential failures
//! 4. Keeps a capped local history of generated prompts

mod admin;
mod api;
mod config;
mod error;
mod history;
mod keys;
mod metrics;
mod storage;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use generation::GeminiClient;
use key_pool::{KeyPool, RetryController};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{AppState, ServiceStats};
use crate::config::Config;
use crate::history::HistoryStore;
use crate::keys::KeyStore;

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/generate", post(api::generate))
        .route(
            "/history",
            get(api::list_history).delete(api::clear_history),
        )
        .route("/history/{id}", delete(api::delete_history_record))
        .route(
            "/keys",
            get(admin::get_keys)
                .put(admin::put_keys)
                .delete(admin::delete_keys),
        )
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting cineprompt");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        endpoint = %config.gemini.endpoint,
        data_dir = %config.storage.data_dir.display(),
        "configuration loaded"
    );

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create data directory {}",
                config.storage.data_dir.display()
            )
        })?;

    let history = HistoryStore::load(config.history_path(), config.storage.history_limit)
        .await
        .context("failed to load history")?;

    let pool = Arc::new(KeyPool::new());
    let keys = KeyStore::initialize(config.keys_path(), pool.clone(), config.api_keys.take())
        .await
        .context("failed to load API keys")?;

    let client = GeminiClient::new(
        reqwest::Client::new(),
        config.gemini.endpoint.clone(),
        Duration::from_secs(config.gemini.timeout_secs),
    );
    let controller = RetryController::new(pool.clone(), Arc::new(client));

    let app_state = AppState {
        controller: Arc::new(controller),
        history: Arc::new(history),
        keys: Arc::new(keys),
        stats: ServiceStats::new(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    let drain_timeout = config.drain_timeout(pool.size().await);
    match tokio::time::timeout(drain_timeout, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = drain_timeout.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Returns 200 when at least one key is loaded, 503 when unconfigured.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.stats.started_at.elapsed().as_secs();
    let generations = state.stats.generations_total.load(Ordering::Relaxed);
    let failures = state.stats.failures_total.load(Ordering::Relaxed);
    let keys_total = state.keys.pool().size().await;
    let source = state.keys.source().await;
    let history_records = state.history.len().await;

    let (status_code, status) = if keys_total > 0 {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unconfigured")
    };

    let body = serde_json::json!({
        "status": status,
        "keys_total": keys_total,
        "key_source": source,
        "history_records": history_records,
        "uptime_seconds": uptime,
        "generations_total": generations,
        "failures_total": failures,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
