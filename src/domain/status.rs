//! Transaction kinds and the order lifecycle
//!
//! Order-kind transactions move through `Ordered -> Dispatched -> Delivered`.
//! Every other kind is created directly in the terminal `Completed` state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Logical event recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Order,
    Payment,
    CreditNote,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Order => "order",
            TransactionKind::Payment => "payment",
            TransactionKind::CreditNote => "credit_note",
        }
    }

    /// Sale and Order move goods out and put the unpaid remainder on the customer's account
    pub fn is_goods_out(&self) -> bool {
        matches!(self, TransactionKind::Sale | TransactionKind::Order)
    }

    /// Lifecycle state a freshly created transaction of this kind starts in
    pub fn initial_status(&self) -> TransactionStatus {
        match self {
            TransactionKind::Order => TransactionStatus::Ordered,
            _ => TransactionStatus::Completed,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sale" => Ok(TransactionKind::Sale),
            "order" => Ok(TransactionKind::Order),
            "payment" => Ok(TransactionKind::Payment),
            "credit_note" | "creditnote" => Ok(TransactionKind::CreditNote),
            other => Err(format!("unknown transaction kind '{}'", other)),
        }
    }
}

/// Persisted lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Ordered,
    Dispatched,
    Delivered,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Ordered => "ordered",
            TransactionStatus::Dispatched => "dispatched",
            TransactionStatus::Delivered => "delivered",
            TransactionStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Delivered | TransactionStatus::Completed
        )
    }

    /// The single state this one may advance to, if any
    pub fn next(&self) -> Option<TransactionStatus> {
        match self {
            TransactionStatus::Ordered => Some(TransactionStatus::Dispatched),
            TransactionStatus::Dispatched => Some(TransactionStatus::Delivered),
            TransactionStatus::Delivered | TransactionStatus::Completed => None,
        }
    }

    /// Validate a requested status change.
    ///
    /// Requesting the current status is a no-op. Otherwise only the single
    /// forward step from `next()` is accepted.
    pub fn transition_to(
        self,
        target: TransactionStatus,
    ) -> Result<TransactionStatus, DomainError> {
        if self == target || self.next() == Some(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidStatusTransition {
                from: self,
                to: target,
            })
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ordered" => Ok(TransactionStatus::Ordered),
            "dispatched" => Ok(TransactionStatus::Dispatched),
            "delivered" => Ok(TransactionStatus::Delivered),
            "completed" => Ok(TransactionStatus::Completed),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Display status derived from the amounts alone, never from the persisted status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    PaymentCompleted,
    PartiallyPaid,
    Unpaid,
}

impl PaymentState {
    pub fn from_amounts(total_amount: Decimal, paid_amount: Decimal) -> Self {
        if paid_amount >= total_amount && paid_amount > Decimal::ZERO {
            PaymentState::PaymentCompleted
        } else if paid_amount > Decimal::ZERO {
            PaymentState::PartiallyPaid
        } else {
            PaymentState::Unpaid
        }
    }
}
