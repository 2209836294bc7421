//! Common error type, result alias and the JSON error envelope.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::orchestrator::GenerationFailure;
use crate::upload::UploadError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Upload(_) => StatusCode::BAD_REQUEST,
            AppError::Generation(_) | AppError::Io(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::BadRequest(message) => {
                tracing::debug!(error = %message, "Rejected request");
                json!({ "error": message })
            }
            AppError::Upload(err) => {
                tracing::debug!(error = %err, "Rejected upload");
                json!({ "error": err.to_string() })
            }
            AppError::Generation(failure) => {
                tracing::error!(error = %failure, "Generation failed");
                failure.to_body()
            }
            AppError::Io(err) => {
                tracing::error!(error = %err, "Storage failure");
                json!({ "error": "Internal storage error" })
            }
            AppError::Config(message) => {
                tracing::error!(error = %message, "Configuration error");
                json!({ "error": message })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Upload(UploadError::MissingFile).status_code(),
            StatusCode::BAD_REQUEST
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(AppError::from(io).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn io_errors_render_a_generic_message() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "/secret/path is full");
        let response = AppError::from(io).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal storage error");
    }
}
