//! Ledger Store Errors
//!
//! Infrastructure failures. Any of these discards the enclosing atomic unit.

use uuid::Uuid;

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be mapped back to a domain record
    #[error("Corrupt row in {table} ({id}): {reason}")]
    CorruptRow {
        table: &'static str,
        id: Uuid,
        reason: String,
    },

    /// A stock change would carry a quantity past the column's range
    #[error("Stock quantity out of range for item {item_id} (change {quantity})")]
    StockOutOfRange { item_id: Uuid, quantity: i64 },

    /// Database migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn corrupt(table: &'static str, id: Uuid, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            id,
            reason: reason.into(),
        }
    }

    /// Map an `int8` overflow raised while changing an item's quantity
    pub(crate) fn from_stock_update(err: sqlx::Error, item_id: Uuid, quantity: i64) -> Self {
        match &err {
            // numeric_value_out_of_range
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("22003") => {
                Self::StockOutOfRange { item_id, quantity }
            }
            _ => Self::Database(err),
        }
    }

    /// Check if this error is worth retrying with a fresh unit
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db_err)) => {
                // serialization_failure / deadlock_detected
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_row_display() {
        let err = StoreError::corrupt("transactions", Uuid::nil(), "unknown kind 'refund'");
        let message = err.to_string();
        assert!(message.contains("transactions"));
        assert!(message.contains("refund"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err = StoreError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_stock_update_passes_other_errors_through() {
        let err = StoreError::from_stock_update(sqlx::Error::RowNotFound, Uuid::nil(), 3);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
