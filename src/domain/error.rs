//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::TransactionStatus;

/// Business rule violations raised while planning or applying a ledger change.
///
/// These errors are independent of the web/storage layer; the ledger engine
/// wraps them into `AppError::Domain`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A stock item cannot cover the requested quantity
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: Uuid,
        requested: i64,
        available: i64,
    },

    /// Invalid amount (zero, negative, malformed, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Line-item quantity must be a positive integer
    #[error("Invalid quantity {quantity} for stock item {item_id}")]
    InvalidQuantity { item_id: Uuid, quantity: i64 },

    /// Order status change not allowed by the lifecycle
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

impl DomainError {
    /// Create an insufficient stock error
    pub fn insufficient_stock(item_id: Uuid, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            item_id,
            requested,
            available,
        }
    }
}
