//! Application error types for robust error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("room not found")]
    RoomNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("forbidden: not room owner")]
    NotRoomOwner,

    /// Room id collision on create. Recoverable: the creator retries with a
    /// fresh id, so this should never reach an HTTP response.
    #[error("room already exists")]
    RoomAlreadyExists,

    #[error("failed to generate unique room id after multiple attempts")]
    IdGenerationExhausted,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::RoomNotFound | AppError::UserNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::NotRoomOwner => (StatusCode::FORBIDDEN, self.to_string()),
            // Store I/O, config, id exhaustion and the rest stay opaque to the
            // caller; the detail goes to the log only.
            _ => {
                tracing::error!(error = %self, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({ "message": message }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
