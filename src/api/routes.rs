//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::domain::{LineItemRecord, OperationContext, TransactionRecord};
use crate::error::AppError;
use crate::handlers::{
    ApplyPaymentCommand, ApplyPaymentResult, CreateTransactionCommand, CreateTransactionResult,
    DeleteTransactionResult, LedgerEngine, UpdateTransactionCommand,
};
use crate::projection::{BalanceCheck, DueEntry, OrderLedgerEntry};
use crate::store::TransactionFilter;

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<LedgerEngine> {
    Router::new()
        // Transactions
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/:transaction_id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
        .route("/transactions/:transaction_id/items", get(get_transaction_items))
        .route(
            "/transactions/:transaction_id/payments",
            get(get_order_payments).post(apply_order_payment),
        )
        // Customers
        .route("/customers/:customer_id/balance", get(verify_customer_balance))
        // Reports
        .route("/reports/dues", get(get_dues))
        .route("/reports/orders", get(get_order_ledger))
        .route("/reports/payments", get(get_payment_history))
}

// =========================================================================
// Transactions
// =========================================================================

/// Record a sale, order, payment or credit note
async fn create_transaction(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Json(command): Json<CreateTransactionCommand>,
) -> Result<(StatusCode, Json<CreateTransactionResult>), AppError> {
    let result = engine.create_transaction(command, &context).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn list_transactions(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let rows = engine.views().list_transactions(&context, &filter).await?;
    Ok(Json(rows))
}

async fn get_transaction(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionRecord>, AppError> {
    let record = engine.views().get_transaction(&context, transaction_id).await?;
    Ok(Json(record))
}

/// Update notes and/or order status
async fn update_transaction(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
    Json(command): Json<UpdateTransactionCommand>,
) -> Result<Json<TransactionRecord>, AppError> {
    let record = engine
        .update_transaction(transaction_id, command, &context)
        .await?;
    Ok(Json(record))
}

async fn delete_transaction(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<DeleteTransactionResult>, AppError> {
    let result = engine.delete_transaction(transaction_id, &context).await?;
    Ok(Json(result))
}

async fn get_transaction_items(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Vec<LineItemRecord>>, AppError> {
    let items = engine
        .views()
        .transaction_items(&context, transaction_id)
        .await?;
    Ok(Json(items))
}

async fn get_order_payments(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let payments = engine.views().order_payments(&context, transaction_id).await?;
    Ok(Json(payments))
}

/// Apply an installment against an order
async fn apply_order_payment(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
    Json(command): Json<ApplyPaymentCommand>,
) -> Result<(StatusCode, Json<ApplyPaymentResult>), AppError> {
    let result = engine
        .apply_order_payment(transaction_id, command, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// =========================================================================
// Customers & reports
// =========================================================================

async fn verify_customer_balance(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<BalanceCheck>, AppError> {
    let check = engine
        .views()
        .verify_customer_balance(&context, customer_id)
        .await?;
    Ok(Json(check))
}

async fn get_dues(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<DueEntry>>, AppError> {
    Ok(Json(engine.views().dues(&context).await?))
}

async fn get_order_ledger(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<OrderLedgerEntry>>, AppError> {
    Ok(Json(engine.views().order_ledger(&context, filter).await?))
}

async fn get_payment_history(
    State(engine): State<LedgerEngine>,
    Extension(context): Extension<OperationContext>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    Ok(Json(engine.views().payment_history(&context, filter).await?))
}
