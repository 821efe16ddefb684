//! Error types for the Muelle server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Unknown upload session: {0}")]
    UnknownSession(String),

    #[error("Upload incomplete: {received} of {expected} chunks received")]
    IncompleteUpload { received: usize, expected: usize },

    #[error("Chunk checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UnknownSession(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::InvalidName(_) | AppError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::IncompleteUpload { .. } | AppError::ChecksumMismatch { .. } => {
                StatusCode::CONFLICT
            }
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response envelope used across the upload API. Upload clients decide
/// success by the `code` field, which mirrors the HTTP status, so every
/// endpoint answers with this shape.
#[derive(Debug, Serialize)]
pub struct ApiStatus {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiStatus {
    pub fn ok() -> Self {
        ApiStatus {
            code: 200,
            message: None,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        ApiStatus {
            code: status.as_u16(),
            message: Some(message.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Io(e) => tracing::error!("IO error: {}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::ChecksumMismatch { .. } => tracing::warn!("{}", self),
            _ => tracing::debug!("Request rejected: {}", self),
        }

        let body = Json(ApiStatus::error(status, self.to_string()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_has_no_message() {
        let json = serde_json::to_value(ApiStatus::ok()).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 200 }));
    }

    #[test]
    fn test_error_envelope_carries_code_and_message() {
        let status = ApiStatus::error(StatusCode::NOT_FOUND, "no such file");
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["code"], 404);
        assert_eq!(json["message"], "no such file");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::UnknownSession("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::IncompleteUpload {
                received: 1,
                expected: 3
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidName("..".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
