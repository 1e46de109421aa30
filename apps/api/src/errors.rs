use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::lifecycle::store::LifecycleError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Store(e) => store_failure(e),
            AppError::Lifecycle(LifecycleError::Store { committed, source }) => {
                let (status, code, message) = store_failure(source);
                (
                    status,
                    code,
                    format!("{message}; {committed} records were moved before the failure"),
                )
            }
            AppError::Lifecycle(e @ LifecycleError::BatchSizeTooSmall(_)) => {
                tracing::error!("Lifecycle misconfigured: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The service batch size is misconfigured".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn store_failure(e: &StoreError) -> (StatusCode, &'static str, String) {
    tracing::error!("Store error: {e}");
    match e {
        StoreError::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            "STORE_TIMEOUT",
            "The record store did not respond in time".to_string(),
        ),
        StoreError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE_UNAVAILABLE",
            "The record store is unavailable".to_string(),
        ),
        StoreError::Conflict(_) => (
            StatusCode::CONFLICT,
            "STORE_CONFLICT",
            "A concurrent write conflicted; retry the request".to_string(),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORE_ERROR",
            "A record store error occurred".to_string(),
        ),
    }
}
