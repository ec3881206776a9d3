//! Postgres Store Integration Tests
//!
//! Skipped unless DATABASE_URL points at a disposable database.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use retail_ledger::domain::{DomainError, TransactionKind};
use retail_ledger::handlers::{ApplyPaymentCommand, CreateTransactionCommand};
use retail_ledger::access::Visibility;
use retail_ledger::store::{LedgerStore, PgLedgerStore, StockTake, TransactionFilter};
use retail_ledger::{Actor, AppError, LedgerEngine, OperationContext};

mod common;

#[tokio::test]
async fn test_conditional_stock_decrement() {
    let Some(pool) = common::connect_test_db().await else {
        return;
    };
    let store = PgLedgerStore::new(pool.clone());
    let item_id = common::seed_stock_item(&pool, 5, dec!(10)).await;

    {
        let mut unit = store.begin().await.unwrap();
        assert_eq!(
            unit.take_stock(item_id, 6).await.unwrap(),
            StockTake::Insufficient { available: 5 }
        );
        assert_eq!(unit.take_stock(item_id, 5).await.unwrap(), StockTake::Taken);
        assert_eq!(
            unit.take_stock(Uuid::new_v4(), 1).await.unwrap(),
            StockTake::Missing
        );
        // Dropped without commit
    }

    let item = store.stock_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.quantity, 5);
}

#[tokio::test]
async fn test_ledger_scenario_on_postgres() {
    let Some(pool) = common::connect_test_db().await else {
        return;
    };
    let salesman = Actor::salesman(Uuid::new_v4());
    let customer_id = common::seed_customer(&pool, Some(salesman.id)).await;
    let shop_id = common::seed_shop(&pool, Some(salesman.id)).await;
    let item_id = common::seed_stock_item(&pool, 10, dec!(100)).await;

    let store = Arc::new(PgLedgerStore::new(pool.clone()));
    let engine = LedgerEngine::with_store(store.clone());
    let context = OperationContext::new().with_actor(salesman);

    let order = engine
        .create_transaction(
            CreateTransactionCommand::new(TransactionKind::Order, customer_id)
                .with_shop(shop_id)
                .with_item(item_id, 5)
                .with_paid_amount("100"),
            &context,
        )
        .await
        .unwrap();
    assert_eq!(order.total_amount, dec!(500));

    engine
        .apply_order_payment(order.transaction_id, ApplyPaymentCommand::new("400"), &context)
        .await
        .unwrap();

    engine
        .create_transaction(
            CreateTransactionCommand::new(TransactionKind::CreditNote, customer_id)
                .with_amount("100"),
            &context,
        )
        .await
        .unwrap();

    let customer = store.customer(customer_id).await.unwrap().unwrap();
    assert_eq!(customer.record.balance, dec!(-100));

    let check = engine
        .views()
        .verify_customer_balance(&context, customer_id)
        .await
        .unwrap();
    assert!(check.consistent);

    let payments = engine
        .views()
        .order_payments(&context, order.transaction_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 2);

    let deleted = engine
        .delete_transaction(order.transaction_id, &context)
        .await
        .unwrap();
    assert_eq!(deleted.balance_delta, Decimal::ZERO);
    assert_eq!(deleted.removed_payments, 2);
    assert_eq!(
        store.stock_item(item_id).await.unwrap().unwrap().quantity,
        10
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_on_postgres() {
    let Some(pool) = common::connect_test_db().await else {
        return;
    };
    let admin = Actor::admin(Uuid::new_v4());
    let customer_id = common::seed_customer(&pool, None).await;
    let item_id = common::seed_stock_item(&pool, 5, dec!(1)).await;

    let store = Arc::new(PgLedgerStore::new(pool.clone()));
    let engine = LedgerEngine::with_store(store.clone());
    let context = OperationContext::new().with_actor(admin);

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let context = context.clone();
            let command = CreateTransactionCommand::new(TransactionKind::Order, customer_id)
                .with_item(item_id, 3);
            tokio::spawn(async move { engine.create_transaction(command, &context).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(
                r,
                Err(AppError::Domain(DomainError::InsufficientStock { .. }))
            ))
            .count(),
        1
    );
    assert_eq!(store.stock_item(item_id).await.unwrap().unwrap().quantity, 2);
}

#[tokio::test]
async fn test_listing_scope_and_paging_in_sql() {
    let Some(pool) = common::connect_test_db().await else {
        return;
    };
    let salesman = Actor::salesman(Uuid::new_v4());
    let own_customer = common::seed_customer(&pool, Some(salesman.id)).await;
    let other_customer = common::seed_customer(&pool, Some(Uuid::new_v4())).await;

    let store = Arc::new(PgLedgerStore::new(pool.clone()));
    let engine = LedgerEngine::with_store(store.clone());
    let admin = OperationContext::new().with_actor(Actor::admin(Uuid::new_v4()));

    for customer_id in [own_customer, other_customer, own_customer, own_customer] {
        engine
            .create_transaction(
                CreateTransactionCommand::new(TransactionKind::Order, customer_id)
                    .with_amount("10"),
                &admin,
            )
            .await
            .unwrap();
    }

    let filter = TransactionFilter {
        limit: Some(2),
        ..TransactionFilter::default()
    };
    let page = store
        .transactions(&filter, Visibility::Involving(salesman.id))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert!(page.iter().all(|row| row.record.customer_id == own_customer));

    let dues = store
        .customers_with_balance_above(Decimal::ZERO, Visibility::Involving(salesman.id))
        .await
        .unwrap();
    assert_eq!(dues.len(), 1);
    assert_eq!(dues[0].record.id, own_customer);
    assert_eq!(dues[0].record.balance, dec!(30));
}
