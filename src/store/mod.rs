//! Ledger Store module
//!
//! Storage seam for the Inventory Store, Account Ledger and Transaction Log.
//! Reads go through [`LedgerStore`]; every mutation happens inside a
//! [`LedgerUnit`] obtained from [`LedgerStore::begin`], which is committed as
//! a whole or discarded when dropped.

mod error;
mod in_memory;
mod postgres;

pub use error::StoreError;
pub use in_memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::{Ownership, Visibility};
use crate::domain::{
    CustomerRecord, LineItemRecord, StockItemRecord, TransactionKind, TransactionRecord,
    TransactionStatus,
};

/// Default page size for transaction listings
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Upper bound for a single listing page
pub const MAX_LIST_LIMIT: i64 = 1000;

/// A transaction row together with the facts the access policy needs
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedTransaction {
    pub record: TransactionRecord,
    pub ownership: Ownership,
}

/// A customer row together with its owner
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedCustomer {
    pub record: CustomerRecord,
    pub ownership: Ownership,
}

/// Outcome of a conditional stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockTake {
    Taken,
    Insufficient { available: i64 },
    Missing,
}

/// Filters for transaction listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub shop_id: Option<Uuid>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl TransactionFilter {
    pub fn of_kind(kind: TransactionKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Whether a row passes the column filters (paging and visibility excluded)
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.kind.map_or(true, |kind| record.kind == kind)
            && self.customer_id.map_or(true, |id| record.customer_id == id)
            && self.shop_id.map_or(true, |id| record.shop_id == Some(id))
    }
}

/// Read side of the ledger storage plus the entry point for atomic units
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start an atomic unit. Dropping the unit without `commit` discards it.
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError>;

    async fn customer(&self, customer_id: Uuid) -> Result<Option<OwnedCustomer>, StoreError>;

    /// Visible customers whose balance exceeds `threshold`, highest balance first
    async fn customers_with_balance_above(
        &self,
        threshold: Decimal,
        visibility: Visibility,
    ) -> Result<Vec<OwnedCustomer>, StoreError>;

    async fn stock_item(&self, item_id: Uuid) -> Result<Option<StockItemRecord>, StoreError>;

    async fn transaction(&self, transaction_id: Uuid)
        -> Result<Option<OwnedTransaction>, StoreError>;

    /// One page of visible transactions matching `filter`, newest first
    async fn transactions(
        &self,
        filter: &TransactionFilter,
        visibility: Visibility,
    ) -> Result<Vec<OwnedTransaction>, StoreError>;

    async fn line_items(&self, transaction_id: Uuid) -> Result<Vec<LineItemRecord>, StoreError>;

    /// Payment audit entries recorded against a parent order/sale, oldest first
    async fn child_payments(&self, parent_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// One atomic unit against the backing store.
///
/// Stock, balance and log mutations made through a unit become visible to
/// other units only after `commit`.
#[async_trait]
pub trait LedgerUnit: Send {
    async fn customer(&mut self, customer_id: Uuid) -> Result<Option<OwnedCustomer>, StoreError>;

    /// Read a customer and lock it for the rest of the unit, holding off
    /// balance changes from other units
    async fn customer_for_update(
        &mut self,
        customer_id: Uuid,
    ) -> Result<Option<OwnedCustomer>, StoreError>;

    /// Every transaction for a customer, oldest first
    async fn customer_transactions(
        &mut self,
        customer_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Owner of a shop; `None` when the shop does not exist
    async fn shop_owner(&mut self, shop_id: Uuid) -> Result<Option<Option<Uuid>>, StoreError>;

    async fn stock_item(&mut self, item_id: Uuid) -> Result<Option<StockItemRecord>, StoreError>;

    /// Read a transaction and lock it for the rest of the unit
    async fn transaction_for_update(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Option<OwnedTransaction>, StoreError>;

    /// Decrement stock only if at least `quantity` is on hand
    async fn take_stock(&mut self, item_id: Uuid, quantity: i64) -> Result<StockTake, StoreError>;

    /// Increment stock; returns false when the item does not exist
    async fn restock(&mut self, item_id: Uuid, quantity: i64) -> Result<bool, StoreError>;

    /// Add a signed delta to a customer's balance and return the new balance;
    /// `None` when the customer does not exist
    async fn adjust_balance(
        &mut self,
        customer_id: Uuid,
        delta: Decimal,
    ) -> Result<Option<Decimal>, StoreError>;

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError>;

    async fn insert_line_items(&mut self, items: &[LineItemRecord]) -> Result<(), StoreError>;

    async fn line_items(&mut self, transaction_id: Uuid)
        -> Result<Vec<LineItemRecord>, StoreError>;

    async fn child_payments(&mut self, parent_id: Uuid)
        -> Result<Vec<TransactionRecord>, StoreError>;

    async fn set_paid_amount(
        &mut self,
        transaction_id: Uuid,
        paid_amount: Decimal,
    ) -> Result<(), StoreError>;

    async fn update_details(
        &mut self,
        transaction_id: Uuid,
        notes: Option<&str>,
        status: TransactionStatus,
    ) -> Result<(), StoreError>;

    /// Remove a transaction, its line items and its payment audit children
    async fn delete_transaction(&mut self, transaction_id: Uuid) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
