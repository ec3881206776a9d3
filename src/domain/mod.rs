//! Domain module
//!
//! Core domain types and business rules.

pub mod amount;
pub mod context;
pub mod error;
pub mod records;
pub mod status;

pub use amount::{parse_non_negative, Amount, AmountError};
pub use context::OperationContext;
pub use error::DomainError;
pub use records::{CustomerRecord, LineItemRecord, ShopRecord, StockItemRecord, TransactionRecord};
pub use status::{PaymentState, TransactionKind, TransactionStatus};
