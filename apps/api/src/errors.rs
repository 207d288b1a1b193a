use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("AI model error: {0}")]
    Model(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Errors produced by the receipt analysis pipeline.
///
/// Structural errors (`ExtractionFailed`, `NotAReceipt`) are terminal and
/// surfaced to the user with a specific message. `ModelUnavailable` is an
/// infrastructure failure and maps to a generic 500 with the cause logged
/// server-side only.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no readable text could be extracted from the document")]
    ExtractionFailed,

    #[error("document is not a grocery receipt (model verdict: {verdict})")]
    NotAReceipt { verdict: String },

    #[error("AI model call failed: {0}")]
    ModelUnavailable(#[from] LlmError),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ExtractionFailed => AppError::Validation(
                "The uploaded document could not be read. Please upload a clear image or PDF of a receipt.".to_string(),
            ),
            PipelineError::NotAReceipt { verdict } => AppError::UnprocessableEntity(format!(
                "The uploaded file is not a readable grocery receipt (classifier verdict: {verdict})."
            )),
            PipelineError::ModelUnavailable(e) => AppError::Model(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Model(msg) => {
                tracing::error!("AI model error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MODEL_ERROR",
                    "An AI processing error occurred".to_string(),
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
