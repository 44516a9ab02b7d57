use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::editor::EditorError;
use crate::persistence::PersistenceError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PersistenceError> for AppError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::NotFound(id) => AppError::NotFound(format!("Document {id}")),
            PersistenceError::Invalid(msg) => AppError::Validation(msg),
            PersistenceError::Database(e) => AppError::Database(e),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<EditorError> for AppError {
    fn from(e: EditorError) -> Self {
        match e {
            EditorError::Validation(msg) => AppError::Validation(msg),
            EditorError::NotFound(msg) => AppError::NotFound(msg),
            EditorError::Initialization(msg) => AppError::Conflict(msg),
            EditorError::NoActiveDocument => AppError::Conflict(e.to_string()),
            EditorError::Persistence(e) => e.into(),
            EditorError::Conflict { .. } | EditorError::UnknownTemplate(_) => {
                AppError::Internal(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_editor_errors_map_to_http_status() {
        let cases = [
            (EditorError::validation("bad"), StatusCode::BAD_REQUEST),
            (EditorError::not_found("page"), StatusCode::NOT_FOUND),
            (
                EditorError::Initialization("busy".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                EditorError::Persistence(PersistenceError::NotFound(Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
            (
                EditorError::Persistence(PersistenceError::Unavailable("down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                EditorError::Persistence(PersistenceError::Invalid("slug".to_string())),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
