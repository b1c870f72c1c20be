use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Daily limit exceeded")]
    RateLimit {
        limit: i64,
        reset_at: DateTime<Utc>,
        suggestion: String,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            AppError::Authentication(ref msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.to_string()),
            // Rate limits carry a structured body with the reset time.
            AppError::RateLimit {
                limit,
                reset_at,
                suggestion,
            } => {
                let body = Json(json!({
                    "error": "daily_limit_exceeded",
                    "limit": limit,
                    "reset_at": reset_at.to_rfc3339(),
                    "suggestion": suggestion,
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            }
            AppError::Provider(ref msg) => {
                tracing::error!("Provider error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.to_string())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
