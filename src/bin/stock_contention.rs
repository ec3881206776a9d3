//! Stock Contention Tool
//!
//! Fires concurrent orders at a single stock item and checks that it never
//! oversells.
//!
//! Run with: cargo run --bin stock_contention --release -- --orders 200 --stock 50 --quantity 3
//! Add `--memory` to run against the in-memory store instead of DATABASE_URL.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use retail_ledger::domain::{CustomerRecord, DomainError, StockItemRecord, TransactionKind};
use retail_ledger::handlers::CreateTransactionCommand;
use retail_ledger::store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};
use retail_ledger::{Actor, AppError, LedgerEngine, OperationContext};

fn arg<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let orders: usize = arg(&args, "--orders", 100);
    let stock: i64 = arg(&args, "--stock", 20);
    let quantity: i64 = arg(&args, "--quantity", 1);
    let in_memory = args.iter().any(|a| a == "--memory");

    let admin = Actor::admin(Uuid::new_v4());
    let customer = CustomerRecord::new(Uuid::new_v4(), "Contention Customer", Some(admin.id));
    let item = StockItemRecord {
        id: Uuid::new_v4(),
        name: "Contended Item".to_string(),
        quantity: stock,
        unit_price: Decimal::ONE,
        category_id: None,
    };

    let store: Arc<dyn LedgerStore> = if in_memory {
        println!("Using in-memory store");
        let store = InMemoryLedgerStore::new();
        store.insert_customer(customer.clone()).await;
        store.insert_stock_item(item.clone()).await;
        Arc::new(store)
    } else {
        let database_url = std::env::var("DATABASE_URL")?;
        println!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await?;

        sqlx::query("INSERT INTO customers (id, name, salesman_id) VALUES ($1, $2, $3)")
            .bind(customer.id)
            .bind(&customer.name)
            .bind(customer.salesman_id)
            .execute(&pool)
            .await?;
        sqlx::query(
            "INSERT INTO stock_items (id, name, quantity, unit_price) VALUES ($1, $2, $3, $4)",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&pool)
        .await?;

        Arc::new(PgLedgerStore::new(pool))
    };

    let engine = LedgerEngine::with_store(store.clone());
    let context = OperationContext::new().with_actor(admin);

    println!(
        "Stock Contention - {} orders x {} against stock {}",
        orders, quantity, stock
    );

    let start = Instant::now();
    let tasks: Vec<_> = (0..orders)
        .map(|_| {
            let engine = engine.clone();
            let context = context.clone();
            let command = CreateTransactionCommand::new(TransactionKind::Order, customer.id)
                .with_item(item.id, quantity);
            tokio::spawn(async move { engine.create_transaction(command, &context).await })
        })
        .collect();

    let mut accepted = 0i64;
    let mut rejected = 0i64;
    let mut contended = 0i64;
    let mut failed = 0i64;
    for task in tasks {
        match task.await? {
            Ok(_) => accepted += 1,
            Err(AppError::Domain(DomainError::InsufficientStock { .. })) => rejected += 1,
            // Pool timeouts, serialization failures and deadlocks
            Err(AppError::Storage(e)) if e.is_retryable() => contended += 1,
            Err(e) => {
                eprintln!("Order failed: {}", e);
                failed += 1;
            }
        }
    }
    let elapsed = start.elapsed();

    let remaining = store
        .stock_item(item.id)
        .await?
        .map(|item| item.quantity)
        .unwrap_or_default();
    let expected_remaining = stock - accepted * quantity;
    let check = engine
        .views()
        .verify_customer_balance(&context, customer.id)
        .await?;

    println!("\n=== Stock Contention Results ===");
    println!("Accepted: {}", accepted);
    println!("Rejected (insufficient stock): {}", rejected);
    println!("Retryable storage failures: {}", contended);
    println!("Failed: {}", failed);
    println!("Remaining stock: {} (expected {})", remaining, expected_remaining);
    println!(
        "Customer balance: {} (log says {})",
        check.recorded, check.expected
    );
    println!("Time: {:.2}s", elapsed.as_secs_f64());

    if remaining != expected_remaining || remaining < 0 || !check.consistent {
        anyhow::bail!("ledger inconsistent after contention run");
    }

    Ok(())
}
