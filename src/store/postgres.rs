//! Postgres Ledger Store
//!
//! Each [`LedgerUnit`] wraps one database transaction. Stock is taken with a
//! conditional `UPDATE ... WHERE quantity >= $n`, so two units racing for the
//! same item serialise on the row lock and the loser sees the reduced quantity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Executor, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::access::{Ownership, Visibility};
use crate::domain::{
    CustomerRecord, LineItemRecord, StockItemRecord, TransactionKind, TransactionRecord,
    TransactionStatus,
};

use super::{
    LedgerStore, LedgerUnit, OwnedCustomer, OwnedTransaction, StockTake, StoreError,
    TransactionFilter,
};

const TRANSACTION_SELECT: &str = r#"
    SELECT
        t.id, t.kind, t.total_amount, t.paid_amount, t.status, t.notes,
        t.actor_id, t.customer_id, t.shop_id, t.parent_id, t.created_at,
        c.salesman_id AS customer_owner,
        s.salesman_id AS shop_owner
    FROM transactions t
    JOIN customers c ON c.id = t.customer_id
    LEFT JOIN shops s ON s.id = t.shop_id
"#;

const CUSTOMER_SELECT: &str = r#"
    SELECT id, name, phone, balance, locked, salesman_id
    FROM customers
"#;

/// Ledger store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new PgLedgerStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One database transaction. Dropping it without `commit` rolls back.
pub struct PgLedgerUnit {
    tx: Transaction<'static, Postgres>,
}

// =========================================================================
// Row mapping
// =========================================================================

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;

    Ok(TransactionRecord {
        id,
        kind: kind
            .parse::<TransactionKind>()
            .map_err(|e| StoreError::corrupt("transactions", id, e))?,
        total_amount: row.try_get("total_amount")?,
        paid_amount: row.try_get("paid_amount")?,
        status: status
            .parse::<TransactionStatus>()
            .map_err(|e| StoreError::corrupt("transactions", id, e))?,
        notes: row.try_get("notes")?,
        actor_id: row.try_get("actor_id")?,
        customer_id: row.try_get("customer_id")?,
        shop_id: row.try_get("shop_id")?,
        parent_id: row.try_get("parent_id")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn owned_transaction_from_row(row: &PgRow) -> Result<OwnedTransaction, StoreError> {
    let record = transaction_from_row(row)?;
    let ownership = Ownership {
        author_id: Some(record.actor_id),
        customer_owner: row.try_get("customer_owner")?,
        shop_owner: row.try_get("shop_owner")?,
    };
    Ok(OwnedTransaction { record, ownership })
}

fn customer_from_row(row: &PgRow) -> Result<OwnedCustomer, StoreError> {
    let record = CustomerRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        balance: row.try_get("balance")?,
        locked: row.try_get("locked")?,
        salesman_id: row.try_get("salesman_id")?,
    };
    let ownership = Ownership::of_customer(record.salesman_id);
    Ok(OwnedCustomer { record, ownership })
}

fn stock_item_from_row(row: &PgRow) -> Result<StockItemRecord, StoreError> {
    Ok(StockItemRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        category_id: row.try_get("category_id")?,
    })
}

fn line_item_from_row(row: &PgRow) -> Result<LineItemRecord, StoreError> {
    Ok(LineItemRecord {
        id: row.try_get("id")?,
        transaction_id: row.try_get("transaction_id")?,
        stock_item_id: row.try_get("stock_item_id")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
    })
}

// =========================================================================
// Queries shared by the pool and open units
// =========================================================================

async fn fetch_customer<'e, E>(
    executor: E,
    customer_id: Uuid,
) -> Result<Option<OwnedCustomer>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("{CUSTOMER_SELECT} WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(customer_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(customer_from_row).transpose()
}

async fn fetch_stock_item<'e, E>(
    executor: E,
    item_id: Uuid,
) -> Result<Option<StockItemRecord>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(
        r#"
        SELECT id, name, quantity, unit_price, category_id
        FROM stock_items
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(stock_item_from_row).transpose()
}

async fn fetch_line_items<'e, E>(
    executor: E,
    transaction_id: Uuid,
) -> Result<Vec<LineItemRecord>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, transaction_id, stock_item_id, quantity, unit_price
        FROM transaction_line_items
        WHERE transaction_id = $1
        ORDER BY position
        "#,
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await?;
    rows.iter().map(line_item_from_row).collect()
}

async fn fetch_child_payments<'e, E>(
    executor: E,
    parent_id: Uuid,
) -> Result<Vec<TransactionRecord>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "{TRANSACTION_SELECT}
        WHERE t.parent_id = $1 AND t.kind = 'payment'
        ORDER BY t.created_at, t.id"
    );
    let rows = sqlx::query(&sql).bind(parent_id).fetch_all(executor).await?;
    rows.iter().map(transaction_from_row).collect()
}

// =========================================================================
// LedgerStore
// =========================================================================

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerUnit { tx }))
    }

    async fn customer(&self, customer_id: Uuid) -> Result<Option<OwnedCustomer>, StoreError> {
        fetch_customer(&self.pool, customer_id).await
    }

    async fn customers_with_balance_above(
        &self,
        threshold: Decimal,
        visibility: Visibility,
    ) -> Result<Vec<OwnedCustomer>, StoreError> {
        let sql = format!(
            "{CUSTOMER_SELECT}
            WHERE balance > $1 AND ($2::uuid IS NULL OR salesman_id = $2)
            ORDER BY balance DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(threshold)
            .bind(visibility.involved_actor())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn stock_item(&self, item_id: Uuid) -> Result<Option<StockItemRecord>, StoreError> {
        fetch_stock_item(&self.pool, item_id).await
    }

    async fn transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<OwnedTransaction>, StoreError> {
        let sql = format!("{TRANSACTION_SELECT} WHERE t.id = $1");
        let row = sqlx::query(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(owned_transaction_from_row).transpose()
    }

    async fn transactions(
        &self,
        filter: &TransactionFilter,
        visibility: Visibility,
    ) -> Result<Vec<OwnedTransaction>, StoreError> {
        // $4 mirrors OwnershipPolicy: author, customer owner or shop owner
        let sql = format!(
            r#"{TRANSACTION_SELECT}
            WHERE ($1::text IS NULL OR t.kind = $1)
              AND ($2::uuid IS NULL OR t.customer_id = $2)
              AND ($3::uuid IS NULL OR t.shop_id = $3)
              AND ($4::uuid IS NULL
                   OR t.actor_id = $4
                   OR c.salesman_id = $4
                   OR s.salesman_id = $4)
            ORDER BY t.created_at DESC, t.id
            LIMIT $5 OFFSET $6
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.kind.map(|kind| kind.as_str()))
            .bind(filter.customer_id)
            .bind(filter.shop_id)
            .bind(visibility.involved_actor())
            .bind(filter.effective_limit())
            .bind(filter.effective_offset())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(owned_transaction_from_row).collect()
    }

    async fn line_items(&self, transaction_id: Uuid) -> Result<Vec<LineItemRecord>, StoreError> {
        fetch_line_items(&self.pool, transaction_id).await
    }

    async fn child_payments(&self, parent_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        fetch_child_payments(&self.pool, parent_id).await
    }
}

// =========================================================================
// LedgerUnit
// =========================================================================

#[async_trait]
impl LedgerUnit for PgLedgerUnit {
    async fn customer(&mut self, customer_id: Uuid) -> Result<Option<OwnedCustomer>, StoreError> {
        fetch_customer(&mut *self.tx, customer_id).await
    }

    async fn customer_for_update(
        &mut self,
        customer_id: Uuid,
    ) -> Result<Option<OwnedCustomer>, StoreError> {
        let sql = format!("{CUSTOMER_SELECT} WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn customer_transactions(
        &mut self,
        customer_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let sql = format!(
            "{TRANSACTION_SELECT}
            WHERE t.customer_id = $1
            ORDER BY t.created_at, t.id"
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn shop_owner(&mut self, shop_id: Uuid) -> Result<Option<Option<Uuid>>, StoreError> {
        let owner: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT salesman_id FROM shops WHERE id = $1")
                .bind(shop_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(owner)
    }

    async fn stock_item(&mut self, item_id: Uuid) -> Result<Option<StockItemRecord>, StoreError> {
        fetch_stock_item(&mut *self.tx, item_id).await
    }

    async fn transaction_for_update(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Option<OwnedTransaction>, StoreError> {
        let sql = format!("{TRANSACTION_SELECT} WHERE t.id = $1 FOR UPDATE OF t");
        let row = sqlx::query(&sql)
            .bind(transaction_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(owned_transaction_from_row).transpose()
    }

    async fn take_stock(&mut self, item_id: Uuid, quantity: i64) -> Result<StockTake, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity = quantity - $2, updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(StockTake::Taken);
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM stock_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(match available {
            Some(available) => StockTake::Insufficient { available },
            None => StockTake::Missing,
        })
    }

    async fn restock(&mut self, item_id: Uuid, quantity: i64) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::from_stock_update(e, item_id, quantity))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn adjust_balance(
        &mut self,
        customer_id: Uuid,
        delta: Decimal,
    ) -> Result<Option<Decimal>, StoreError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(customer_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(balance)
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, kind, total_amount, paid_amount, status, notes,
                actor_id, customer_id, shop_id, parent_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(record.total_amount)
        .bind(record.paid_amount)
        .bind(record.status.as_str())
        .bind(&record.notes)
        .bind(record.actor_id)
        .bind(record.customer_id)
        .bind(record.shop_id)
        .bind(record.parent_id)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_line_items(&mut self, items: &[LineItemRecord]) -> Result<(), StoreError> {
        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transaction_line_items (
                    id, transaction_id, stock_item_id, quantity, unit_price, position
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(item.transaction_id)
            .bind(item.stock_item_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn line_items(
        &mut self,
        transaction_id: Uuid,
    ) -> Result<Vec<LineItemRecord>, StoreError> {
        fetch_line_items(&mut *self.tx, transaction_id).await
    }

    async fn child_payments(
        &mut self,
        parent_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        fetch_child_payments(&mut *self.tx, parent_id).await
    }

    async fn set_paid_amount(
        &mut self,
        transaction_id: Uuid,
        paid_amount: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE transactions SET paid_amount = $2 WHERE id = $1")
            .bind(transaction_id)
            .bind(paid_amount)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_details(
        &mut self,
        transaction_id: Uuid,
        notes: Option<&str>,
        status: TransactionStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET notes = COALESCE($2, notes), status = $3
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(notes)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_transaction(&mut self, transaction_id: Uuid) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM transactions WHERE parent_id = $1")
            .bind(transaction_id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("DELETE FROM transaction_line_items WHERE transaction_id = $1")
            .bind(transaction_id)
            .execute(&mut *self.tx)
            .await?;

        let rows_affected = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(transaction_id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
