//! Ledger records
//!
//! Rows of the four logical tables the ledger reads and writes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentState, TransactionKind, TransactionStatus};

/// Customer account. `balance` is positive when the customer owes money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub balance: Decimal,
    /// Blocks new orders; enforced upstream of the ledger
    pub locked: bool,
    pub salesman_id: Option<Uuid>,
}

impl CustomerRecord {
    pub fn new(id: Uuid, name: impl Into<String>, salesman_id: Option<Uuid>) -> Self {
        Self {
            id,
            name: name.into(),
            phone: None,
            balance: Decimal::ZERO,
            locked: false,
            salesman_id,
        }
    }
}

/// Shop directory entry; only its owner matters to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub id: Uuid,
    pub name: String,
    pub salesman_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItemRecord {
    pub id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub category_id: Option<Uuid>,
}

/// One row of the transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: TransactionStatus,
    pub notes: Option<String>,
    pub actor_id: Uuid,
    pub customer_id: Uuid,
    pub shop_id: Option<Uuid>,
    /// Set on payment audit entries recorded against an order or sale
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Outstanding amount on a Sale/Order
    pub fn balance_due(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }

    pub fn payment_state(&self) -> PaymentState {
        PaymentState::from_amounts(self.total_amount, self.paid_amount)
    }

    /// Signed change this row contributes to the customer's balance.
    ///
    /// Payment audit entries (those with a parent) contribute nothing: their
    /// amount is already reflected in the parent's `paid_amount`.
    pub fn balance_contribution(&self) -> Decimal {
        match self.kind {
            TransactionKind::Sale | TransactionKind::Order => self.balance_due(),
            TransactionKind::CreditNote => -self.total_amount,
            TransactionKind::Payment if self.parent_id.is_some() => Decimal::ZERO,
            TransactionKind::Payment => -self.total_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub stock_item_id: Uuid,
    pub quantity: i64,
    /// Price snapshot at the time of the transaction
    pub unit_price: Decimal,
}

impl LineItemRecord {
    /// `quantity x unit_price`; `None` when the product leaves `Decimal` range
    pub fn line_total(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(kind: TransactionKind, total: Decimal, paid: Decimal) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4(),
            kind,
            total_amount: total,
            paid_amount: paid,
            status: kind.initial_status(),
            notes: None,
            actor_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            shop_id: None,
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_contribution_per_kind() {
        assert_eq!(
            record(TransactionKind::Order, dec!(1000), dec!(300)).balance_contribution(),
            dec!(700)
        );
        assert_eq!(
            record(TransactionKind::Sale, dec!(50), dec!(50)).balance_contribution(),
            dec!(0)
        );
        assert_eq!(
            record(TransactionKind::CreditNote, dec!(100), dec!(0)).balance_contribution(),
            dec!(-100)
        );
        assert_eq!(
            record(TransactionKind::Payment, dec!(80), dec!(0)).balance_contribution(),
            dec!(-80)
        );
    }

    #[test]
    fn test_payment_audit_entry_has_no_balance_effect() {
        let mut audit = record(TransactionKind::Payment, dec!(300), dec!(0));
        audit.parent_id = Some(Uuid::new_v4());
        assert_eq!(audit.balance_contribution(), Decimal::ZERO);
    }

    fn line(quantity: i64, unit_price: Decimal) -> LineItemRecord {
        LineItemRecord {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            stock_item_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(3, dec!(12.50)).line_total(), Some(dec!(37.50)));
    }

    #[test]
    fn test_line_total_out_of_range() {
        assert_eq!(line(i64::MAX, Decimal::MAX).line_total(), None);
    }
}
