//! Ledger Engine
//!
//! Single entry point bundling the command handlers and read views over one
//! injected store and access policy. Cheap to clone; used as the HTTP state.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::access::{AccessPolicy, OwnershipPolicy};
use crate::domain::{OperationContext, TransactionRecord};
use crate::error::AppError;
use crate::projection::ProjectionService;
use crate::store::LedgerStore;

use super::{
    ApplyPaymentCommand, ApplyPaymentHandler, ApplyPaymentResult, CreateTransactionCommand,
    CreateTransactionHandler, CreateTransactionResult, DeleteTransactionHandler,
    DeleteTransactionResult, UpdateTransactionCommand, UpdateTransactionHandler,
};

#[derive(Clone)]
pub struct LedgerEngine {
    create: Arc<CreateTransactionHandler>,
    update: Arc<UpdateTransactionHandler>,
    delete: Arc<DeleteTransactionHandler>,
    payment: Arc<ApplyPaymentHandler>,
    views: ProjectionService,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self {
            create: Arc::new(CreateTransactionHandler::new(store.clone(), policy.clone())),
            update: Arc::new(UpdateTransactionHandler::new(store.clone(), policy.clone())),
            delete: Arc::new(DeleteTransactionHandler::new(store.clone(), policy.clone())),
            payment: Arc::new(ApplyPaymentHandler::new(store.clone(), policy.clone())),
            views: ProjectionService::new(store, policy),
        }
    }

    /// Engine with the default ownership policy
    pub fn with_store(store: Arc<dyn LedgerStore>) -> Self {
        Self::new(store, Arc::new(OwnershipPolicy))
    }

    pub fn with_dues_threshold(mut self, dues_threshold: Decimal) -> Self {
        self.views = self.views.with_dues_threshold(dues_threshold);
        self
    }

    pub async fn create_transaction(
        &self,
        command: CreateTransactionCommand,
        context: &OperationContext,
    ) -> Result<CreateTransactionResult, AppError> {
        self.create.execute(command, context).await
    }

    pub async fn update_transaction(
        &self,
        transaction_id: Uuid,
        command: UpdateTransactionCommand,
        context: &OperationContext,
    ) -> Result<TransactionRecord, AppError> {
        self.update.execute(transaction_id, command, context).await
    }

    pub async fn delete_transaction(
        &self,
        transaction_id: Uuid,
        context: &OperationContext,
    ) -> Result<DeleteTransactionResult, AppError> {
        self.delete.execute(transaction_id, context).await
    }

    pub async fn apply_order_payment(
        &self,
        transaction_id: Uuid,
        command: ApplyPaymentCommand,
        context: &OperationContext,
    ) -> Result<ApplyPaymentResult, AppError> {
        self.payment.execute(transaction_id, command, context).await
    }

    /// Read-only views
    pub fn views(&self) -> &ProjectionService {
        &self.views
    }
}
