// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    /// Any read or write against the data store failed. Never replaced by a
    /// zero or partial figure.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Corrupt session data: {0}")]
    CorruptSessionData(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Document not found")]
    DocumentNotFound,

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::DataUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "Data unavailable".to_string()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()),
            AppError::SessionExpired => (StatusCode::UNAUTHORIZED, "Session expired".to_string()),
            AppError::CorruptSessionData(_) => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized access".to_string()),
            AppError::DocumentNotFound => (StatusCode::NOT_FOUND, "Document not found".to_string()),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format".to_string()),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict".to_string()),
            AppError::AmountOverflow => (StatusCode::UNPROCESSABLE_ENTITY, "Amount overflow".to_string()),
            AppError::SessionStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Session store error".to_string()),
            AppError::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DataUnavailable(err.to_string())
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(err: std::num::ParseIntError) -> Self {
        AppError::ValidationError(format!("Integer parsing error: {}", err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::SessionStore(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized
    }
}

// Helper conversion functions
impl AppError {
    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        AppError::DataUnavailable(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn session_store(msg: impl Into<String>) -> Self {
        AppError::SessionStore(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::data_unavailable("boom"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(AppError::InvalidCredentials, StatusCode::UNAUTHORIZED)]
    #[case(AppError::SessionExpired, StatusCode::UNAUTHORIZED)]
    #[case(AppError::DocumentNotFound, StatusCode::NOT_FOUND)]
    #[case(AppError::conflict("already paid"), StatusCode::CONFLICT)]
    #[case(AppError::invalid_data("page"), StatusCode::BAD_REQUEST)]
    fn maps_errors_to_status_codes(#[case] error: AppError, #[case] expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[test]
    fn store_failures_become_data_unavailable() {
        let error: AppError = StoreError::Backend("connection reset".to_string()).into();
        assert!(matches!(error, AppError::DataUnavailable(message) if message.contains("connection reset")));
    }
}
