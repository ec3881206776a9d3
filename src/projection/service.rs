//! Projection Service
//!
//! Read-only views over the ledger: dues, the order ledger, payment history
//! and transaction lookups. Every view is narrowed by the access policy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::domain::{
    LineItemRecord, OperationContext, PaymentState, TransactionKind, TransactionRecord,
    TransactionStatus,
};
use crate::error::AppError;
use crate::store::{LedgerStore, OwnedTransaction, TransactionFilter};

/// Default threshold above which a balance counts as a due (0.01)
pub fn default_dues_threshold() -> Decimal {
    Decimal::new(1, 2)
}

/// Customer that currently owes money
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueEntry {
    pub customer_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub balance: Decimal,
    pub locked: bool,
}

/// Order-kind transaction with amounts derived for the credit ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLedgerEntry {
    pub transaction_id: Uuid,
    pub customer_id: Uuid,
    pub shop_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub payment_state: PaymentState,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for OrderLedgerEntry {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            transaction_id: record.id,
            customer_id: record.customer_id,
            shop_id: record.shop_id,
            total_amount: record.total_amount,
            paid_amount: record.paid_amount,
            balance_due: record.balance_due(),
            payment_state: record.payment_state(),
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// Recorded balance compared with the balance recomputed from the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub customer_id: Uuid,
    pub recorded: Decimal,
    pub expected: Decimal,
    pub consistent: bool,
}

/// Projection Service for ledger queries
#[derive(Clone)]
pub struct ProjectionService {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn AccessPolicy>,
    dues_threshold: Decimal,
}

impl ProjectionService {
    pub fn new(store: Arc<dyn LedgerStore>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self {
            store,
            policy,
            dues_threshold: default_dues_threshold(),
        }
    }

    pub fn with_dues_threshold(mut self, dues_threshold: Decimal) -> Self {
        self.dues_threshold = dues_threshold;
        self
    }

    pub fn dues_threshold(&self) -> Decimal {
        self.dues_threshold
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Customers owing more than the threshold, highest balance first
    pub async fn dues(&self, context: &OperationContext) -> Result<Vec<DueEntry>, AppError> {
        let actor = context.require_actor()?;

        let dues = self
            .store
            .customers_with_balance_above(self.dues_threshold, self.policy.visibility(actor))
            .await?
            .into_iter()
            .filter(|customer| self.policy.can_access(actor, &customer.ownership))
            .map(|customer| DueEntry {
                customer_id: customer.record.id,
                name: customer.record.name,
                phone: customer.record.phone,
                balance: customer.record.balance,
                locked: customer.record.locked,
            })
            .collect();

        Ok(dues)
    }

    /// Order-kind transactions with derived balance due and payment state
    pub async fn order_ledger(
        &self,
        context: &OperationContext,
        filter: TransactionFilter,
    ) -> Result<Vec<OrderLedgerEntry>, AppError> {
        let filter = TransactionFilter {
            kind: Some(TransactionKind::Order),
            ..filter
        };
        let orders = self.list_transactions(context, &filter).await?;
        Ok(orders.iter().map(OrderLedgerEntry::from).collect())
    }

    /// Payment-kind transactions, newest first
    pub async fn payment_history(
        &self,
        context: &OperationContext,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let filter = TransactionFilter {
            kind: Some(TransactionKind::Payment),
            ..filter
        };
        self.list_transactions(context, &filter).await
    }

    /// One page of the transactions visible to the actor, newest first
    pub async fn list_transactions(
        &self,
        context: &OperationContext,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let actor = context.require_actor()?;

        let rows = self
            .store
            .transactions(filter, self.policy.visibility(actor))
            .await?
            .into_iter()
            .map(|owned| owned.record)
            .collect();

        Ok(rows)
    }

    pub async fn get_transaction(
        &self,
        context: &OperationContext,
        transaction_id: Uuid,
    ) -> Result<TransactionRecord, AppError> {
        Ok(self.visible_transaction(context, transaction_id).await?.record)
    }

    /// Line items of a visible transaction
    pub async fn transaction_items(
        &self,
        context: &OperationContext,
        transaction_id: Uuid,
    ) -> Result<Vec<LineItemRecord>, AppError> {
        self.visible_transaction(context, transaction_id).await?;
        Ok(self.store.line_items(transaction_id).await?)
    }

    /// Payment audit entries recorded against a visible order or sale
    pub async fn order_payments(
        &self,
        context: &OperationContext,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.visible_transaction(context, transaction_id).await?;
        Ok(self.store.child_payments(transaction_id).await?)
    }

    /// Recompute a customer's balance from the transaction log.
    ///
    /// The balance and the log are read in one unit with the customer row
    /// locked. The unit is dropped without commit.
    pub async fn verify_customer_balance(
        &self,
        context: &OperationContext,
        customer_id: Uuid,
    ) -> Result<BalanceCheck, AppError> {
        let actor = context.require_actor()?;
        let mut unit = self.store.begin().await?;

        let customer = unit
            .customer_for_update(customer_id)
            .await?
            .filter(|customer| self.policy.can_access(actor, &customer.ownership))
            .ok_or(AppError::CustomerNotFound(customer_id))?;

        let expected: Decimal = unit
            .customer_transactions(customer_id)
            .await?
            .iter()
            .map(TransactionRecord::balance_contribution)
            .sum();
        drop(unit);

        let recorded = customer.record.balance;
        let consistent = recorded == expected;
        if !consistent {
            tracing::warn!(
                customer_id = %customer_id,
                recorded = %recorded,
                expected = %expected,
                "Customer balance drifted from transaction log"
            );
        }

        Ok(BalanceCheck {
            customer_id,
            recorded,
            expected,
            consistent,
        })
    }

    async fn visible_transaction(
        &self,
        context: &OperationContext,
        transaction_id: Uuid,
    ) -> Result<OwnedTransaction, AppError> {
        let actor = context.require_actor()?;

        self.store
            .transaction(transaction_id)
            .await?
            .filter(|owned| self.policy.can_access(actor, &owned.ownership))
            .ok_or(AppError::TransactionNotFound(transaction_id))
    }
}
