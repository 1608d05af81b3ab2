//! Generation and history handlers

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use key_pool::{AttemptRecord, RetryController};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::history::HistoryStore;
use crate::keys::KeyStore;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RetryController>,
    pub history: Arc<HistoryStore>,
    pub keys: Arc<KeyStore>,
    pub stats: ServiceStats,
    pub prometheus: PrometheusHandle,
}

/// Counters reported by `/health`.
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub started_at: Instant,
    pub generations_total: Arc<AtomicU64>,
    pub failures_total: Arc<AtomicU64>,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            generations_total: Arc::new(AtomicU64::new(0)),
            failures_total: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub story: String,
}

fn attempt_json(attempt: &AttemptRecord) -> serde_json::Value {
    serde_json::json!({
        "attempt": attempt.attempt_number,
        "key_index": attempt.credential_index,
        "outcome": attempt.outcome.label(),
    })
}

/// `POST /generate`
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.story.trim().is_empty() {
        return Err(ApiError::InvalidRequest("story must not be blank".into()));
    }

    let started = Instant::now();
    let report = state.controller.run(&request.story).await;
    let elapsed = started.elapsed().as_secs_f64();
    let attempts = report.attempts.len();

    // Rotation may have moved the cursor; keep the interactive list in step.
    if let Err(e) = state.keys.persist_cursor().await {
        warn!(error = %e, "failed to persist key cursor");
    }

    match report.result {
        Ok(prompt) => {
            crate::metrics::record_generation("success", elapsed);
            state.stats.generations_total.fetch_add(1, Ordering::Relaxed);
            info!(attempts, elapsed_secs = elapsed, "generation succeeded");

            let record = match state.history.append(&request.story, &prompt).await {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "failed to save history record");
                    None
                }
            };

            Ok(Json(serde_json::json!({
                "prompt": prompt,
                "attempts": report.attempts.iter().map(attempt_json).collect::<Vec<_>>(),
                "record": record,
            })))
        }
        Err(source) => {
            crate::metrics::record_generation(source.label(), elapsed);
            state.stats.failures_total.fetch_add(1, Ordering::Relaxed);
            warn!(error = %source, attempts, "generation failed");
            Err(ApiError::Generation { source, attempts })
        }
    }
}

/// `GET /history`
pub async fn list_history(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history.list().await;
    Json(serde_json::json!({ "history": history }))
}

/// `DELETE /history`
pub async fn clear_history(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.history.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /history/{id}`
pub async fn delete_history_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.history.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no history record with id {id}")))
    }
}
