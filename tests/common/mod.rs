//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use retail_ledger::domain::{CustomerRecord, ShopRecord, StockItemRecord};
use retail_ledger::store::InMemoryLedgerStore;
use retail_ledger::{Actor, LedgerEngine};

/// Connect to the test database and apply migrations.
///
/// Returns `None` when DATABASE_URL is not set so Postgres tests can skip.
pub async fn connect_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    retail_ledger::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

pub async fn seed_customer(pool: &PgPool, salesman_id: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO customers (id, name, salesman_id) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("Customer {}", id))
        .bind(salesman_id)
        .execute(pool)
        .await
        .expect("Failed to seed customer");
    id
}

pub async fn seed_shop(pool: &PgPool, salesman_id: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO shops (id, name, salesman_id) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("Shop {}", id))
        .bind(salesman_id)
        .execute(pool)
        .await
        .expect("Failed to seed shop");
    id
}

pub async fn seed_stock_item(pool: &PgPool, quantity: i64, unit_price: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO stock_items (id, name, quantity, unit_price) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(format!("Item {}", id))
    .bind(quantity)
    .bind(unit_price)
    .execute(pool)
    .await
    .expect("Failed to seed stock item");
    id
}

/// In-memory ledger with one salesman owning a customer and a shop
pub struct InMemoryLedger {
    pub store: InMemoryLedgerStore,
    pub engine: LedgerEngine,
    pub salesman: Actor,
    pub admin: Actor,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub stock_id: Uuid,
}

pub async fn in_memory_ledger(stock_quantity: i64, unit_price: Decimal) -> InMemoryLedger {
    let store = InMemoryLedgerStore::new();
    let salesman = Actor::salesman(Uuid::new_v4());
    let admin = Actor::admin(Uuid::new_v4());

    let customer = CustomerRecord::new(Uuid::new_v4(), "Corner Store", Some(salesman.id));
    let shop = ShopRecord {
        id: Uuid::new_v4(),
        name: "Main Street".to_string(),
        salesman_id: Some(salesman.id),
    };
    let item = StockItemRecord {
        id: Uuid::new_v4(),
        name: "Flour 1kg".to_string(),
        quantity: stock_quantity,
        unit_price,
        category_id: None,
    };

    store.insert_customer(customer.clone()).await;
    store.insert_shop(shop.clone()).await;
    store.insert_stock_item(item.clone()).await;

    let engine = LedgerEngine::with_store(Arc::new(store.clone()));

    InMemoryLedger {
        store,
        engine,
        salesman,
        admin,
        customer_id: customer.id,
        shop_id: shop.id,
        stock_id: item.id,
    }
}
