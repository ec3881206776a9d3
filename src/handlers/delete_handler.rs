//! Delete Transaction Handler
//!
//! Hard-removes a transaction and reverses its stock and balance effects in
//! the same unit, so the balance invariant still holds afterwards.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::domain::{OperationContext, TransactionKind};
use crate::error::AppError;
use crate::store::{LedgerStore, StockTake};

use super::transaction_handler::quantities_by_item;
use super::DeleteTransactionResult;

/// Handler for transaction deletion
pub struct DeleteTransactionHandler {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn AccessPolicy>,
}

impl DeleteTransactionHandler {
    pub fn new(store: Arc<dyn LedgerStore>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    pub async fn execute(
        &self,
        transaction_id: Uuid,
        context: &OperationContext,
    ) -> Result<DeleteTransactionResult, AppError> {
        let actor = context.require_actor()?;
        let mut unit = self.store.begin().await?;

        let record = unit
            .transaction_for_update(transaction_id)
            .await?
            .filter(|owned| self.policy.can_access(actor, &owned.ownership))
            .ok_or(AppError::TransactionNotFound(transaction_id))?
            .record;

        if let Some(parent_id) = record.parent_id {
            return Err(AppError::validation(format!(
                "Payment entry belongs to {}; delete the parent instead",
                parent_id
            )));
        }

        let mut removed_payments = 0;
        let balance_delta = match record.kind {
            TransactionKind::Sale | TransactionKind::Order => {
                let items = unit.line_items(transaction_id).await?;
                for (item_id, quantity) in quantities_by_item(&items)? {
                    if !unit.restock(item_id, quantity).await? {
                        tracing::warn!(
                            transaction_id = %transaction_id,
                            stock_item_id = %item_id,
                            "Stock item no longer exists; skipping restock"
                        );
                    }
                }
                removed_payments = unit.child_payments(transaction_id).await?.len();
                -record.balance_due()
            }
            TransactionKind::CreditNote => {
                let items = unit.line_items(transaction_id).await?;
                for (item_id, quantity) in quantities_by_item(&items)? {
                    match unit.take_stock(item_id, quantity).await? {
                        StockTake::Taken => {}
                        StockTake::Insufficient { available } => {
                            return Err(AppError::insufficient_stock(item_id, quantity, available));
                        }
                        StockTake::Missing => {
                            tracing::warn!(
                                transaction_id = %transaction_id,
                                stock_item_id = %item_id,
                                "Stock item no longer exists; skipping return reversal"
                            );
                        }
                    }
                }
                record.total_amount
            }
            TransactionKind::Payment => record.total_amount,
        };

        if balance_delta != Decimal::ZERO {
            unit.adjust_balance(record.customer_id, balance_delta)
                .await?
                .ok_or(AppError::CustomerNotFound(record.customer_id))?;
        }

        if !unit.delete_transaction(transaction_id).await? {
            return Err(AppError::TransactionNotFound(transaction_id));
        }

        unit.commit().await?;

        tracing::info!(
            transaction_id = %transaction_id,
            kind = %record.kind,
            customer_id = %record.customer_id,
            actor_id = %actor.id,
            balance_delta = %balance_delta,
            removed_payments,
            "Transaction deleted"
        );

        Ok(DeleteTransactionResult {
            transaction_id,
            kind: record.kind,
            balance_delta,
            removed_payments,
        })
    }
}
