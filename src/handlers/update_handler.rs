//! Update Transaction Handler
//!
//! Changes the notes of any transaction and advances the lifecycle status of
//! Order-kind transactions. Neither touches stock or balances.

use std::sync::Arc;
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::domain::{OperationContext, TransactionKind, TransactionRecord, TransactionStatus};
use crate::error::AppError;
use crate::store::LedgerStore;

use super::UpdateTransactionCommand;

/// Handler for notes and status updates
pub struct UpdateTransactionHandler {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn AccessPolicy>,
}

impl UpdateTransactionHandler {
    pub fn new(store: Arc<dyn LedgerStore>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    pub async fn execute(
        &self,
        transaction_id: Uuid,
        command: UpdateTransactionCommand,
        context: &OperationContext,
    ) -> Result<TransactionRecord, AppError> {
        let actor = context.require_actor()?;

        let requested = command
            .status
            .as_deref()
            .map(str::parse::<TransactionStatus>)
            .transpose()
            .map_err(AppError::ValidationFailed)?;

        let mut unit = self.store.begin().await?;

        let owned = unit
            .transaction_for_update(transaction_id)
            .await?
            .filter(|owned| self.policy.can_access(actor, &owned.ownership))
            .ok_or(AppError::TransactionNotFound(transaction_id))?;
        let mut record = owned.record;

        let status = match requested {
            Some(target) if target != record.status => {
                if record.kind != TransactionKind::Order {
                    return Err(AppError::validation(format!(
                        "Status of {} transactions cannot change",
                        record.kind
                    )));
                }
                record.status.transition_to(target)?
            }
            _ => record.status,
        };

        unit.update_details(transaction_id, command.notes.as_deref(), status)
            .await?;
        unit.commit().await?;

        tracing::info!(
            transaction_id = %transaction_id,
            actor_id = %actor.id,
            from = %record.status,
            to = %status,
            notes_changed = command.notes.is_some(),
            "Transaction updated"
        );

        record.status = status;
        if let Some(notes) = command.notes {
            record.notes = Some(notes);
        }
        Ok(record)
    }
}
