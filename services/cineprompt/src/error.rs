//! HTTP-facing errors
//!
//! Every failure becomes `{"error":{"type":"...","message":"..."}}` with the
//! message meant to be shown to the operator as-is.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use generation::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{source}")]
    Generation {
        source: key_pool::Error,
        attempts: usize,
    },

    #[error("storage error: {0}")]
    Storage(#[from] common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Generation { source, .. } => match source {
                key_pool::Error::ConfigurationMissing
                | key_pool::Error::AllAttemptsExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                key_pool::Error::Generation { kind, .. } => match kind {
                    FailureKind::Blocked => StatusCode::UNPROCESSABLE_ENTITY,
                    FailureKind::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
                    FailureKind::AuthInvalid => StatusCode::UNAUTHORIZED,
                    FailureKind::OtherTransient | FailureKind::OtherFatal => {
                        StatusCode::BAD_GATEWAY
                    }
                },
            },
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Storage(_) => "storage_error",
            ApiError::Generation { source, .. } => source.label(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = serde_json::json!({
            "type": self.error_type(),
            "message": self.to_string(),
        });
        if let ApiError::Generation { attempts, .. } = &self {
            error["attempts"] = serde_json::json!(attempts);
        }
        (self.status(), Json(serde_json::json!({ "error": error }))).into_response()
    }
}
