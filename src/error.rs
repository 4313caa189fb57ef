//! Error handling module
//!
//! Boundary error type and its HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::LedgerError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Ledger errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // Server errors (5xx)
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "missing_header"),

            AppError::Ledger(err) => match err {
                LedgerError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                LedgerError::InsufficientFunds { .. } => {
                    (StatusCode::CONFLICT, "insufficient_funds")
                }
                LedgerError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                LedgerError::InvariantViolation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation")
                }
                LedgerError::Store(StoreError::DuplicateKey(_)) => {
                    (StatusCode::CONFLICT, "duplicate_idempotency_key")
                }
                LedgerError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            },

            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }

    /// Underlying cause reported in `details`
    fn details(&self) -> Option<String> {
        match self {
            AppError::InvalidRequest(msg) => Some(msg.clone()),
            AppError::MissingHeader(header) => Some(header.clone()),
            AppError::Ledger(err) => match err {
                LedgerError::Validation(msg)
                | LedgerError::NotFound(msg)
                | LedgerError::InvariantViolation(msg) => Some(msg.clone()),
                LedgerError::InsufficientFunds {
                    required,
                    available,
                } => Some(format!(
                    "required {} minor units, available {}",
                    required, available
                )),
                LedgerError::Timeout => Some("request deadline exceeded".to_string()),
                LedgerError::Store(e) => Some(e.to_string()),
            },
            AppError::Config(e) => Some(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        match &self {
            AppError::Ledger(err) if err.is_defect() => {
                tracing::error!(error_code, error = %self, "ledger defect, escalating");
            }
            AppError::Ledger(err) if err.is_client_error() => {
                tracing::info!(error_code, error = %self, "request rejected by ledger rules");
            }
            _ if status.is_server_error() => {
                tracing::error!(error_code, error = %self, "request failed");
            }
            _ => {
                tracing::debug!(error_code, error = %self, "request rejected");
            }
        }

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AppError::InvalidRequest("bad json".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::MissingHeader("Idempotency-Key".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(LedgerError::validation("limit").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(LedgerError::account_not_found(1).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::insufficient_funds(10, 5).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::Timeout.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(LedgerError::InvariantViolation("x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(LedgerError::Store(StoreError::Backend("down".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_details_include_cause() {
        let err = AppError::from(LedgerError::insufficient_funds(10000, 5000));
        let details = err.details().unwrap();
        assert!(details.contains("10000"));
        assert!(details.contains("5000"));

        let err = AppError::from(LedgerError::Store(StoreError::Backend("down".into())));
        assert!(err.details().unwrap().contains("down"));
    }
}
