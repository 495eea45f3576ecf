//! API error responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::error::StudyError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Duplicate submission for a day
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    DayNotOpen(String),

    #[error("{0}")]
    NotFound(String),

    /// Unknown credential on login
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        match err {
            StudyError::Validation(msg) => ApiError::Validation(msg),
            StudyError::NotFound(_) => ApiError::NotFound("Participant not found".to_string()),
            StudyError::Conflict(msg) => ApiError::Conflict(msg),
            e @ StudyError::DayNotOpen { .. } => ApiError::DayNotOpen(e.to_string()),
            e @ (StudyError::CredentialExhausted(_) | StudyError::Storage(_)) => {
                error!(error = %e, "Request failed");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

/// Unreadable JSON bodies (bad types, wrong content type, syntax) are
/// validation failures, answered with the same `{error, code}` body
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Malformed request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Duplicate submissions answer 400, as the study client expects
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Conflict(_) => (StatusCode::BAD_REQUEST, "CONFLICT"),
            ApiError::DayNotOpen(_) => (StatusCode::BAD_REQUEST, "DAY_NOT_OPEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "INVALID_CREDENTIAL"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
