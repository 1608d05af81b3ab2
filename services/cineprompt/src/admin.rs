//! Key management endpoints
//!
//! Raw keys never leave the process; `GET /keys` shows masked values only.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::api::AppState;
use crate::error::ApiError;

/// `GET /keys`
pub async fn get_keys(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.keys.pool();
    let source = state.keys.source().await;
    let cursor = pool.cursor().await;
    let keys = pool.masked().await;
    Json(serde_json::json!({
        "total": keys.len(),
        "cursor": cursor,
        "source": source,
        "keys": keys,
    }))
}

/// `PUT /keys` with a newline-separated key list as the body.
pub async fn put_keys(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let total = state.keys.replace(&body).await?;
    let source = state.keys.source().await;
    Ok(Json(serde_json::json!({
        "total": total,
        "source": source,
    })))
}

/// `DELETE /keys`: forget the interactive list and fall back to the environment.
pub async fn delete_keys(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let source = state.keys.reset().await?;
    let total = state.keys.pool().size().await;
    Ok(Json(serde_json::json!({
        "total": total,
        "source": source,
    })))
}
