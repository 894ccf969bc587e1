//! API error type mapping the core error taxonomy onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::domain::validation::FieldError;
use crate::errors::{GraphError, LedgerError, WorkerError};

/// Errors surfaced by route handlers
pub enum ApiError {
    /// 422 with field-level detail; never retried by clients
    Validation(Vec<FieldError>),
    /// 404
    NotFound(String),
    /// 5xx; transient store failures land here
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                let detail: Vec<_> = errors
                    .iter()
                    .map(|e| json!({"field": e.field, "message": e.message}))
                    .collect();
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": detail})))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({"detail": message}))).into_response()
            }
            ApiError::Internal(message) => {
                error!(error = %message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "Internal server error"})),
                )
                    .into_response()
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
