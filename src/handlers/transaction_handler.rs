//! Create Transaction Handler
//!
//! Records a sale, order, payment or credit note. Stock, the customer's
//! balance and the transaction log are updated inside one store unit.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::access::{AccessPolicy, Ownership};
use crate::domain::{
    parse_non_negative, Amount, DomainError, LineItemRecord, OperationContext, TransactionKind,
    TransactionRecord,
};
use crate::error::AppError;
use crate::store::{LedgerStore, LedgerUnit, StockTake};

use super::{CreateTransactionCommand, CreateTransactionResult, LineItemInput};

/// Largest quantity of one stock item a single transaction may move
pub const MAX_LINE_QUANTITY: i64 = 1_000_000_000;

/// Handler for recording new transactions
pub struct CreateTransactionHandler {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn AccessPolicy>,
}

impl CreateTransactionHandler {
    pub fn new(store: Arc<dyn LedgerStore>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Execute the create transaction command
    pub async fn execute(
        &self,
        command: CreateTransactionCommand,
        context: &OperationContext,
    ) -> Result<CreateTransactionResult, AppError> {
        let actor = context.require_actor()?;
        let kind = command.kind;

        validate_shape(&command)?;

        let mut unit = self.store.begin().await?;

        // Resolve the target and authorize against it
        let customer = unit
            .customer(command.customer_id)
            .await?
            .ok_or(AppError::CustomerNotFound(command.customer_id))?;

        let shop_owner = match command.shop_id {
            Some(shop_id) => unit
                .shop_owner(shop_id)
                .await?
                .ok_or_else(|| AppError::validation(format!("Unknown shop {}", shop_id)))?,
            None => None,
        };

        let target = Ownership::of_target(customer.ownership.customer_owner, shop_owner);
        if !self.policy.can_access(actor, &target) {
            tracing::warn!(
                actor_id = %actor.id,
                customer_id = %command.customer_id,
                shop_id = ?command.shop_id,
                "Transaction rejected: actor has no rights over target"
            );
            return Err(AppError::Unauthorized(
                "Actor has no rights over this customer or shop".to_string(),
            ));
        }

        let transaction_id = Uuid::new_v4();
        let line_items = price_line_items(&mut *unit, transaction_id, &command.items).await?;
        let quantities = quantities_by_item(&line_items)?;

        let total_amount = if line_items.is_empty() {
            let amount = command
                .amount
                .as_deref()
                .ok_or_else(|| AppError::validation("Either items or amount is required"))?;
            amount.parse::<Amount>()?
        } else {
            Amount::new(line_items_total(&line_items)?)?
        }
        .value();

        let paid_amount = resolve_paid_amount(kind, command.paid_amount.as_deref(), total_amount)?;

        // Inventory effect
        apply_stock_effect(&mut *unit, kind, quantities).await?;

        // Transaction log
        let created_at = Utc::now();
        let record = TransactionRecord {
            id: transaction_id,
            kind,
            total_amount,
            paid_amount,
            status: kind.initial_status(),
            notes: command.notes,
            actor_id: actor.id,
            customer_id: command.customer_id,
            shop_id: command.shop_id,
            parent_id: None,
            created_at,
        };
        unit.insert_transaction(&record).await?;
        unit.insert_line_items(&line_items).await?;

        // Account ledger effect
        let customer_balance = unit
            .adjust_balance(command.customer_id, record.balance_contribution())
            .await?
            .ok_or(AppError::CustomerNotFound(command.customer_id))?;

        // Up-front payment is mirrored into the payment history only
        let payment_entry_id = if kind.is_goods_out() && paid_amount > Decimal::ZERO {
            let entry = payment_entry(&record, paid_amount, actor.id);
            unit.insert_transaction(&entry).await?;
            Some(entry.id)
        } else {
            None
        };

        unit.commit().await?;

        tracing::info!(
            transaction_id = %transaction_id,
            kind = %kind,
            customer_id = %record.customer_id,
            actor_id = %actor.id,
            total_amount = %total_amount,
            paid_amount = %paid_amount,
            line_items = line_items.len(),
            "Transaction recorded"
        );

        Ok(CreateTransactionResult {
            transaction_id,
            kind,
            total_amount,
            paid_amount,
            status: record.status,
            payment_entry_id,
            customer_balance,
        })
    }
}

/// Build the Payment-kind audit entry mirroring a payment against `parent`
pub(super) fn payment_entry(
    parent: &TransactionRecord,
    amount: Decimal,
    actor_id: Uuid,
) -> TransactionRecord {
    TransactionRecord {
        id: Uuid::new_v4(),
        kind: TransactionKind::Payment,
        total_amount: amount,
        paid_amount: Decimal::ZERO,
        status: TransactionKind::Payment.initial_status(),
        notes: Some(format!("Payment for {} {}", parent.kind, parent.id)),
        actor_id,
        customer_id: parent.customer_id,
        shop_id: parent.shop_id,
        parent_id: Some(parent.id),
        created_at: Utc::now(),
    }
}

/// Checks that need no store access
fn validate_shape(command: &CreateTransactionCommand) -> Result<(), AppError> {
    if command.kind == TransactionKind::Payment && !command.items.is_empty() {
        return Err(AppError::validation("Payments cannot carry line items"));
    }

    if command.items.is_empty() && command.amount.is_none() {
        return Err(AppError::validation("Either items or amount is required"));
    }

    for item in &command.items {
        if item.quantity <= 0 || item.quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::InvalidQuantity {
                item_id: item.stock_item_id,
                quantity: item.quantity,
            }
            .into());
        }
    }

    Ok(())
}

/// Snapshot a unit price for every requested line
async fn price_line_items(
    unit: &mut dyn LedgerUnit,
    transaction_id: Uuid,
    items: &[LineItemInput],
) -> Result<Vec<LineItemRecord>, AppError> {
    let mut priced = Vec::with_capacity(items.len());

    for item in items {
        let stock = unit.stock_item(item.stock_item_id).await?.ok_or_else(|| {
            AppError::validation(format!("Unknown stock item {}", item.stock_item_id))
        })?;

        let unit_price = match item.unit_price.as_deref() {
            Some(price) => parse_non_negative(price)?,
            None => stock.unit_price,
        };

        priced.push(LineItemRecord {
            id: Uuid::new_v4(),
            transaction_id,
            stock_item_id: item.stock_item_id,
            quantity: item.quantity,
            unit_price,
        });
    }

    Ok(priced)
}

fn resolve_paid_amount(
    kind: TransactionKind,
    paid_amount: Option<&str>,
    total_amount: Decimal,
) -> Result<Decimal, AppError> {
    let paid = match paid_amount {
        Some(raw) => parse_non_negative(raw)?,
        None => Decimal::ZERO,
    };

    if !kind.is_goods_out() {
        if paid > Decimal::ZERO {
            return Err(AppError::validation(format!(
                "paid_amount is not accepted for {} transactions",
                kind
            )));
        }
        return Ok(Decimal::ZERO);
    }

    if paid > total_amount {
        return Err(AppError::validation(format!(
            "paid_amount {} exceeds total {}",
            paid, total_amount
        )));
    }

    Ok(paid)
}

/// Sum of the line totals, checked against `Decimal` range
fn line_items_total(items: &[LineItemRecord]) -> Result<Decimal, AppError> {
    items.iter().try_fold(Decimal::ZERO, |total, item| {
        item.line_total()
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Line total for stock item {} is out of range",
                    item.stock_item_id
                ))
            })
    })
}

/// Quantities per stock item, in ascending item order.
///
/// Repeated lines for one item are summed; the sum is held to
/// [`MAX_LINE_QUANTITY`] like a single line.
pub(super) fn quantities_by_item(
    items: &[LineItemRecord],
) -> Result<BTreeMap<Uuid, i64>, AppError> {
    let mut quantities = BTreeMap::new();
    for item in items {
        let merged = quantities.entry(item.stock_item_id).or_insert(0i64);
        *merged = merged
            .checked_add(item.quantity)
            .filter(|quantity| *quantity <= MAX_LINE_QUANTITY)
            .ok_or(DomainError::InvalidQuantity {
                item_id: item.stock_item_id,
                quantity: item.quantity,
            })?;
    }
    Ok(quantities)
}

async fn apply_stock_effect(
    unit: &mut dyn LedgerUnit,
    kind: TransactionKind,
    quantities: BTreeMap<Uuid, i64>,
) -> Result<(), AppError> {
    match kind {
        TransactionKind::Sale | TransactionKind::Order => {
            for (item_id, quantity) in quantities {
                match unit.take_stock(item_id, quantity).await? {
                    StockTake::Taken => {}
                    StockTake::Insufficient { available } => {
                        tracing::warn!(
                            stock_item_id = %item_id,
                            requested = quantity,
                            available,
                            "Transaction rejected: insufficient stock"
                        );
                        return Err(AppError::insufficient_stock(item_id, quantity, available));
                    }
                    StockTake::Missing => {
                        return Err(AppError::validation(format!(
                            "Unknown stock item {}",
                            item_id
                        )));
                    }
                }
            }
        }
        TransactionKind::CreditNote => {
            for (item_id, quantity) in quantities {
                if !unit.restock(item_id, quantity).await? {
                    return Err(AppError::validation(format!(
                        "Unknown stock item {}",
                        item_id
                    )));
                }
            }
        }
        TransactionKind::Payment => {}
    }

    Ok(())
}
