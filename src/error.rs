//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AmountError, DomainError};
use crate::store::StoreError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Customer not found: {0}")]
    CustomerNotFound(Uuid),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Shorthand for the insufficient-stock business error
    pub fn insufficient_stock(item_id: Uuid, requested: i64, available: i64) -> Self {
        Self::Domain(DomainError::insufficient_stock(item_id, requested, available))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StockOutOfRange { item_id, quantity } => {
                AppError::Domain(DomainError::InvalidQuantity { item_id, quantity })
            }
            other => AppError::Storage(other),
        }
    }
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        AppError::Domain(DomainError::InvalidAmount(err.to_string()))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::ValidationFailed(msg) => {
                (StatusCode::BAD_REQUEST, "validation_failed", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 403 Forbidden
            AppError::Unauthorized(msg) => {
                (StatusCode::FORBIDDEN, "unauthorized", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::TransactionNotFound(id) => {
                (StatusCode::NOT_FOUND, "transaction_not_found", Some(id.to_string()))
            }
            AppError::CustomerNotFound(id) => {
                (StatusCode::NOT_FOUND, "customer_not_found", Some(id.to_string()))
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InsufficientStock { item_id, .. } => {
                    (StatusCode::CONFLICT, "insufficient_stock", Some(item_id.to_string()))
                }
                DomainError::InvalidStatusTransition { .. } => (
                    StatusCode::CONFLICT,
                    "invalid_status_transition",
                    Some(domain_err.to_string()),
                ),
                DomainError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                }
                DomainError::InvalidQuantity { .. } => (
                    StatusCode::BAD_REQUEST,
                    "invalid_quantity",
                    Some(domain_err.to_string()),
                ),
            },

            // 500 Internal Server Error
            AppError::Storage(e) => {
                tracing::error!("Storage failure: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure", None)
            }
        };

        // Infrastructure detail stays in the logs
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (AppError::validation("missing customer"), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("not your shop".into()), StatusCode::FORBIDDEN),
            (AppError::TransactionNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (AppError::insufficient_stock(Uuid::nil(), 6, 5), StatusCode::CONFLICT),
            (
                AppError::Storage(StoreError::Database(sqlx::Error::PoolTimedOut)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_stock_range_error_is_a_client_error() {
        let err: AppError = StoreError::StockOutOfRange {
            item_id: Uuid::nil(),
            quantity: 7,
        }
        .into();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::InvalidQuantity { quantity: 7, .. })
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_amount_error_maps_to_invalid_amount() {
        let err: AppError = AmountError::ParseError("abc".into()).into();
        assert!(matches!(err, AppError::Domain(DomainError::InvalidAmount(_))));
    }
}
