//! Command definitions
//!
//! Commands represent intentions to change the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{TransactionKind, TransactionStatus};

// =========================================================================
// CreateTransactionCommand
// =========================================================================

/// One requested line of a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub stock_item_id: Uuid,
    pub quantity: i64,
    /// Unit price as a decimal string; the stock item's current price when omitted
    #[serde(default)]
    pub unit_price: Option<String>,
}

/// Command to record a sale, order, payment or credit note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionCommand {
    pub kind: TransactionKind,
    pub customer_id: Uuid,
    #[serde(default)]
    pub shop_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    /// Flat amount, used only when there are no line items
    #[serde(default)]
    pub amount: Option<String>,
    /// Amount settled up front (Sale/Order only)
    #[serde(default)]
    pub paid_amount: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateTransactionCommand {
    pub fn new(kind: TransactionKind, customer_id: Uuid) -> Self {
        Self {
            kind,
            customer_id,
            shop_id: None,
            items: Vec::new(),
            amount: None,
            paid_amount: None,
            notes: None,
        }
    }

    pub fn with_shop(mut self, shop_id: Uuid) -> Self {
        self.shop_id = Some(shop_id);
        self
    }

    pub fn with_item(mut self, stock_item_id: Uuid, quantity: i64) -> Self {
        self.items.push(LineItemInput {
            stock_item_id,
            quantity,
            unit_price: None,
        });
        self
    }

    pub fn with_priced_item(
        mut self,
        stock_item_id: Uuid,
        quantity: i64,
        unit_price: impl Into<String>,
    ) -> Self {
        self.items.push(LineItemInput {
            stock_item_id,
            quantity,
            unit_price: Some(unit_price.into()),
        });
        self
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn with_paid_amount(mut self, paid_amount: impl Into<String>) -> Self {
        self.paid_amount = Some(paid_amount.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Result of a recorded transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionResult {
    pub transaction_id: Uuid,
    pub kind: TransactionKind,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: TransactionStatus,
    /// Auxiliary payment entry created for an up-front payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_entry_id: Option<Uuid>,
    pub customer_balance: Decimal,
}

// =========================================================================
// UpdateTransactionCommand
// =========================================================================

/// Command to change the mutable details of a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTransactionCommand {
    #[serde(default)]
    pub notes: Option<String>,
    /// Requested lifecycle status (Order-kind only)
    #[serde(default)]
    pub status: Option<String>,
}

impl UpdateTransactionCommand {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            notes: None,
            status: Some(status.into()),
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            status: None,
        }
    }
}

// =========================================================================
// ApplyPaymentCommand
// =========================================================================

/// Command to apply an installment against an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPaymentCommand {
    /// Amount paid (as string for precise decimal)
    pub amount_paid: String,
}

impl ApplyPaymentCommand {
    pub fn new(amount_paid: impl Into<String>) -> Self {
        Self {
            amount_paid: amount_paid.into(),
        }
    }
}

/// Result of an applied installment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPaymentResult {
    pub transaction_id: Uuid,
    pub payment_id: Uuid,
    pub amount_paid: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub status: TransactionStatus,
}

/// Result of a deleted transaction and its reversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTransactionResult {
    pub transaction_id: Uuid,
    pub kind: TransactionKind,
    /// Signed change applied to the customer's balance by the reversal
    pub balance_delta: Decimal,
    /// Payment audit entries removed with the transaction
    pub removed_payments: usize,
}
