//! In-memory Ledger Store
//!
//! Used by tests and local development. A unit takes the store lock for its
//! whole lifetime and works on a staged copy of the state, which replaces the
//! live state on commit. Dropping the unit leaves the live state untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::access::{Ownership, Visibility};
use crate::domain::{
    CustomerRecord, LineItemRecord, ShopRecord, StockItemRecord, TransactionKind,
    TransactionRecord, TransactionStatus,
};

use super::{
    LedgerStore, LedgerUnit, OwnedCustomer, OwnedTransaction, StockTake, StoreError,
    TransactionFilter,
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    customers: HashMap<Uuid, CustomerRecord>,
    shops: HashMap<Uuid, ShopRecord>,
    stock_items: HashMap<Uuid, StockItemRecord>,
    /// Insertion order
    transactions: Vec<TransactionRecord>,
    line_items: Vec<LineItemRecord>,
}

impl LedgerState {
    fn owned_customer(&self, customer_id: Uuid) -> Option<OwnedCustomer> {
        self.customers.get(&customer_id).map(|record| OwnedCustomer {
            ownership: Ownership::of_customer(record.salesman_id),
            record: record.clone(),
        })
    }

    fn owned_transaction(&self, record: &TransactionRecord) -> OwnedTransaction {
        let customer_owner = self
            .customers
            .get(&record.customer_id)
            .and_then(|c| c.salesman_id);
        let shop_owner = record
            .shop_id
            .and_then(|id| self.shops.get(&id))
            .and_then(|s| s.salesman_id);

        OwnedTransaction {
            record: record.clone(),
            ownership: Ownership {
                author_id: Some(record.actor_id),
                customer_owner,
                shop_owner,
            },
        }
    }

    fn transactions_of(&self, customer_id: Uuid) -> Vec<TransactionRecord> {
        self.transactions
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect()
    }

    fn find_transaction(&self, transaction_id: Uuid) -> Option<&TransactionRecord> {
        self.transactions.iter().find(|t| t.id == transaction_id)
    }

    fn find_transaction_mut(&mut self, transaction_id: Uuid) -> Option<&mut TransactionRecord> {
        self.transactions.iter_mut().find(|t| t.id == transaction_id)
    }

    fn line_items_of(&self, transaction_id: Uuid) -> Vec<LineItemRecord> {
        self.line_items
            .iter()
            .filter(|item| item.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    fn child_payments_of(&self, parent_id: Uuid) -> Vec<TransactionRecord> {
        self.transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Payment && t.parent_id == Some(parent_id))
            .cloned()
            .collect()
    }
}

/// Ledger store held entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_customer(&self, customer: CustomerRecord) {
        self.state
            .lock()
            .await
            .customers
            .insert(customer.id, customer);
    }

    pub async fn insert_shop(&self, shop: ShopRecord) {
        self.state.lock().await.shops.insert(shop.id, shop);
    }

    pub async fn insert_stock_item(&self, item: StockItemRecord) {
        self.state.lock().await.stock_items.insert(item.id, item);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryUnit { guard, staged }))
    }

    async fn customer(&self, customer_id: Uuid) -> Result<Option<OwnedCustomer>, StoreError> {
        Ok(self.state.lock().await.owned_customer(customer_id))
    }

    async fn customers_with_balance_above(
        &self,
        threshold: Decimal,
        visibility: Visibility,
    ) -> Result<Vec<OwnedCustomer>, StoreError> {
        let state = self.state.lock().await;
        let mut customers: Vec<OwnedCustomer> = state
            .customers
            .values()
            .filter(|c| c.balance > threshold)
            .filter_map(|c| state.owned_customer(c.id))
            .filter(|owned| visibility.admits(&owned.ownership))
            .collect();
        customers.sort_by(|a, b| {
            b.record
                .balance
                .cmp(&a.record.balance)
                .then(a.record.id.cmp(&b.record.id))
        });
        Ok(customers)
    }

    async fn stock_item(&self, item_id: Uuid) -> Result<Option<StockItemRecord>, StoreError> {
        Ok(self.state.lock().await.stock_items.get(&item_id).cloned())
    }

    async fn transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<OwnedTransaction>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .find_transaction(transaction_id)
            .map(|record| state.owned_transaction(record)))
    }

    async fn transactions(
        &self,
        filter: &TransactionFilter,
        visibility: Visibility,
    ) -> Result<Vec<OwnedTransaction>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|record| filter.matches(record))
            .map(|record| state.owned_transaction(record))
            .filter(|owned| visibility.admits(&owned.ownership))
            .skip(filter.effective_offset() as usize)
            .take(filter.effective_limit() as usize)
            .collect())
    }

    async fn line_items(&self, transaction_id: Uuid) -> Result<Vec<LineItemRecord>, StoreError> {
        Ok(self.state.lock().await.line_items_of(transaction_id))
    }

    async fn child_payments(&self, parent_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.state.lock().await.child_payments_of(parent_id))
    }
}

struct InMemoryUnit {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
}

#[async_trait]
impl LedgerUnit for InMemoryUnit {
    async fn customer(&mut self, customer_id: Uuid) -> Result<Option<OwnedCustomer>, StoreError> {
        Ok(self.staged.owned_customer(customer_id))
    }

    async fn customer_for_update(
        &mut self,
        customer_id: Uuid,
    ) -> Result<Option<OwnedCustomer>, StoreError> {
        // The unit already holds the store lock
        Ok(self.staged.owned_customer(customer_id))
    }

    async fn customer_transactions(
        &mut self,
        customer_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.staged.transactions_of(customer_id))
    }

    async fn shop_owner(&mut self, shop_id: Uuid) -> Result<Option<Option<Uuid>>, StoreError> {
        Ok(self.staged.shops.get(&shop_id).map(|shop| shop.salesman_id))
    }

    async fn stock_item(&mut self, item_id: Uuid) -> Result<Option<StockItemRecord>, StoreError> {
        Ok(self.staged.stock_items.get(&item_id).cloned())
    }

    async fn transaction_for_update(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Option<OwnedTransaction>, StoreError> {
        Ok(self
            .staged
            .find_transaction(transaction_id)
            .map(|record| self.staged.owned_transaction(record)))
    }

    async fn take_stock(&mut self, item_id: Uuid, quantity: i64) -> Result<StockTake, StoreError> {
        let Some(item) = self.staged.stock_items.get_mut(&item_id) else {
            return Ok(StockTake::Missing);
        };
        if item.quantity < quantity {
            return Ok(StockTake::Insufficient {
                available: item.quantity,
            });
        }
        item.quantity -= quantity;
        Ok(StockTake::Taken)
    }

    async fn restock(&mut self, item_id: Uuid, quantity: i64) -> Result<bool, StoreError> {
        match self.staged.stock_items.get_mut(&item_id) {
            Some(item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(StoreError::StockOutOfRange { item_id, quantity })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn adjust_balance(
        &mut self,
        customer_id: Uuid,
        delta: Decimal,
    ) -> Result<Option<Decimal>, StoreError> {
        Ok(self.staged.customers.get_mut(&customer_id).map(|customer| {
            customer.balance += delta;
            customer.balance
        }))
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.staged.transactions.push(record.clone());
        Ok(())
    }

    async fn insert_line_items(&mut self, items: &[LineItemRecord]) -> Result<(), StoreError> {
        self.staged.line_items.extend_from_slice(items);
        Ok(())
    }

    async fn line_items(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Vec<LineItemRecord>, StoreError> {
        Ok(self.staged.line_items_of(transaction_id))
    }

    async fn child_payments(
        &mut self,
        parent_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.staged.child_payments_of(parent_id))
    }

    async fn set_paid_amount(
        &mut self,
        transaction_id: Uuid,
        paid_amount: Decimal,
    ) -> Result<(), StoreError> {
        if let Some(record) = self.staged.find_transaction_mut(transaction_id) {
            record.paid_amount = paid_amount;
        }
        Ok(())
    }

    async fn update_details(
        &mut self,
        transaction_id: Uuid,
        notes: Option<&str>,
        status: TransactionStatus,
    ) -> Result<(), StoreError> {
        if let Some(record) = self.staged.find_transaction_mut(transaction_id) {
            if let Some(notes) = notes {
                record.notes = Some(notes.to_string());
            }
            record.status = status;
        }
        Ok(())
    }

    async fn delete_transaction(&mut self, transaction_id: Uuid) -> Result<bool, StoreError> {
        let before = self.staged.transactions.len();
        self.staged
            .transactions
            .retain(|t| t.id != transaction_id && t.parent_id != Some(transaction_id));
        self.staged
            .line_items
            .retain(|item| item.transaction_id != transaction_id);
        Ok(self.staged.transactions.len() < before)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnit { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn widget(quantity: i64) -> StockItemRecord {
        StockItemRecord {
            id: Uuid::new_v4(),
            name: "Widget".to_string(),
            quantity,
            unit_price: dec!(10),
            category_id: None,
        }
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_changes() {
        let store = InMemoryLedgerStore::new();
        let item = widget(5);
        store.insert_stock_item(item.clone()).await;

        {
            let mut unit = store.begin().await.unwrap();
            assert_eq!(unit.take_stock(item.id, 2).await.unwrap(), StockTake::Taken);
        }

        let stored = store.stock_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 5);
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = InMemoryLedgerStore::new();
        let item = widget(5);
        let customer = CustomerRecord::new(Uuid::new_v4(), "Acme", None);
        store.insert_stock_item(item.clone()).await;
        store.insert_customer(customer.clone()).await;

        let mut unit = store.begin().await.unwrap();
        unit.take_stock(item.id, 3).await.unwrap();
        assert_eq!(
            unit.adjust_balance(customer.id, dec!(30)).await.unwrap(),
            Some(dec!(30))
        );
        assert_eq!(unit.adjust_balance(Uuid::new_v4(), dec!(1)).await.unwrap(), None);
        unit.commit().await.unwrap();

        assert_eq!(store.stock_item(item.id).await.unwrap().unwrap().quantity, 2);
        let stored = store.customer(customer.id).await.unwrap().unwrap();
        assert_eq!(stored.record.balance, dec!(30));
    }

    #[tokio::test]
    async fn test_take_stock_outcomes() {
        let store = InMemoryLedgerStore::new();
        let item = widget(5);
        store.insert_stock_item(item.clone()).await;

        let mut unit = store.begin().await.unwrap();
        assert_eq!(
            unit.take_stock(item.id, 6).await.unwrap(),
            StockTake::Insufficient { available: 5 }
        );
        assert_eq!(
            unit.take_stock(Uuid::new_v4(), 1).await.unwrap(),
            StockTake::Missing
        );
        assert_eq!(unit.take_stock(item.id, 5).await.unwrap(), StockTake::Taken);
        assert_eq!(
            unit.take_stock(item.id, 1).await.unwrap(),
            StockTake::Insufficient { available: 0 }
        );
    }

    #[tokio::test]
    async fn test_restock_rejects_overflow() {
        let store = InMemoryLedgerStore::new();
        let item = widget(i64::MAX - 1);
        store.insert_stock_item(item.clone()).await;

        let mut unit = store.begin().await.unwrap();
        assert!(unit.restock(item.id, 1).await.unwrap());
        assert!(matches!(
            unit.restock(item.id, 1).await,
            Err(StoreError::StockOutOfRange { quantity: 1, .. })
        ));
        drop(unit);

        assert_eq!(
            store.stock_item(item.id).await.unwrap().unwrap().quantity,
            i64::MAX - 1
        );
    }

    #[tokio::test]
    async fn test_listing_is_scoped_then_paged() {
        let store = InMemoryLedgerStore::new();
        let salesman = Uuid::new_v4();
        let mine = CustomerRecord::new(Uuid::new_v4(), "Mine", Some(salesman));
        let theirs = CustomerRecord::new(Uuid::new_v4(), "Theirs", Some(Uuid::new_v4()));
        store.insert_customer(mine.clone()).await;
        store.insert_customer(theirs.clone()).await;

        let mut unit = store.begin().await.unwrap();
        for n in 0..5 {
            // Interleave foreign rows so paging before scoping would show
            for customer_id in [mine.id, theirs.id] {
                let record = TransactionRecord {
                    id: Uuid::new_v4(),
                    kind: TransactionKind::Sale,
                    total_amount: Decimal::from(n + 1),
                    paid_amount: Decimal::from(n + 1),
                    status: TransactionStatus::Completed,
                    notes: None,
                    actor_id: Uuid::new_v4(),
                    customer_id,
                    shop_id: None,
                    parent_id: None,
                    created_at: Utc::now(),
                };
                unit.insert_transaction(&record).await.unwrap();
            }
        }
        unit.commit().await.unwrap();

        let page = TransactionFilter {
            limit: Some(2),
            offset: Some(1),
            ..TransactionFilter::default()
        };
        let rows = store
            .transactions(&page, Visibility::Involving(salesman))
            .await
            .unwrap();
        let totals: Vec<Decimal> = rows.iter().map(|r| r.record.total_amount).collect();
        assert_eq!(totals, vec![dec!(4), dec!(3)]);
        assert!(rows.iter().all(|r| r.record.customer_id == mine.id));

        let everything = TransactionFilter {
            limit: Some(100),
            ..TransactionFilter::default()
        };
        assert_eq!(
            store
                .transactions(&everything, Visibility::All)
                .await
                .unwrap()
                .len(),
            10
        );
    }

    #[test]
    fn test_seeding_is_visible_to_reads() {
        let store = InMemoryLedgerStore::new();
        let customer = CustomerRecord::new(Uuid::new_v4(), "Acme", Some(Uuid::new_v4()));

        tokio_test::block_on(store.insert_customer(customer.clone()));
        let owned = tokio_test::block_on(store.customer(customer.id))
            .unwrap()
            .unwrap();

        assert_eq!(owned.record, customer);
        assert_eq!(owned.ownership.customer_owner, customer.salesman_id);
    }
}
