//! Payment Application Handler
//!
//! Applies an installment against an Order: raises its paid amount, lowers the
//! customer's balance and appends a Payment audit entry, all in one unit.

use std::sync::Arc;

use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::domain::{Amount, OperationContext, TransactionKind};
use crate::error::AppError;
use crate::store::LedgerStore;

use super::transaction_handler::payment_entry;
use super::{ApplyPaymentCommand, ApplyPaymentResult};

/// Handler for order installments
pub struct ApplyPaymentHandler {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn AccessPolicy>,
}

impl ApplyPaymentHandler {
    pub fn new(store: Arc<dyn LedgerStore>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Execute the apply payment command
    pub async fn execute(
        &self,
        transaction_id: Uuid,
        command: ApplyPaymentCommand,
        context: &OperationContext,
    ) -> Result<ApplyPaymentResult, AppError> {
        let actor = context.require_actor()?;

        let amount: Amount = command
            .amount_paid
            .parse()
            .map_err(|e| AppError::validation(format!("Invalid amount_paid: {}", e)))?;
        let amount = amount.value();

        let mut unit = self.store.begin().await?;

        let order = unit
            .transaction_for_update(transaction_id)
            .await?
            .filter(|owned| self.policy.can_access(actor, &owned.ownership))
            .ok_or(AppError::TransactionNotFound(transaction_id))?
            .record;

        if order.kind != TransactionKind::Order {
            return Err(AppError::validation(format!(
                "Installments apply to orders only, not {} transactions",
                order.kind
            )));
        }

        let paid_amount = order.paid_amount + amount;
        if paid_amount > order.total_amount {
            tracing::warn!(
                transaction_id = %transaction_id,
                amount_paid = %amount,
                balance_due = %order.balance_due(),
                "Installment rejected: over-payment"
            );
            return Err(AppError::validation(format!(
                "Payment of {} exceeds balance due {}",
                amount,
                order.balance_due()
            )));
        }

        unit.set_paid_amount(transaction_id, paid_amount).await?;

        let customer_balance = unit
            .adjust_balance(order.customer_id, -amount)
            .await?
            .ok_or(AppError::CustomerNotFound(order.customer_id))?;

        let entry = payment_entry(&order, amount, actor.id);
        unit.insert_transaction(&entry).await?;

        unit.commit().await?;

        tracing::info!(
            transaction_id = %transaction_id,
            payment_id = %entry.id,
            customer_id = %order.customer_id,
            actor_id = %actor.id,
            amount_paid = %amount,
            paid_amount = %paid_amount,
            customer_balance = %customer_balance,
            "Installment applied"
        );

        Ok(ApplyPaymentResult {
            transaction_id,
            payment_id: entry.id,
            amount_paid: amount,
            paid_amount,
            balance_due: order.total_amount - paid_amount,
            status: order.status,
        })
    }
}
