mod common;

use assert_matches::assert_matches;
use common::TestApp;
use fulfillment_core::errors::ServiceError;
use fulfillment_core::models::commission::{CommissionItem, CommissionStatus};
use fulfillment_core::services::commissions::CreateCommissionRequest;
use uuid::Uuid;

#[tokio::test]
async fn adjust_is_all_or_nothing() {
    let app = TestApp::new();
    let ledger = app.state.stock_ledger();
    let item = Uuid::new_v4();

    assert_eq!(ledger.adjust(item, app.main_warehouse, 7).await.unwrap(), 7);
    assert_eq!(ledger.adjust(item, app.main_warehouse, -3).await.unwrap(), 4);

    // A delta that would go negative fails and leaves the quantity alone.
    assert_matches!(
        ledger.adjust(item, app.main_warehouse, -5).await,
        Err(ServiceError::InsufficientStock(_))
    );
    assert_eq!(app.stock(item, app.main_warehouse).await, 4);
}

#[tokio::test]
async fn missing_records_read_as_zero() {
    let app = TestApp::new();
    let ledger = app.state.stock_ledger();
    let item = Uuid::new_v4();

    assert_eq!(ledger.quantity_at(item, app.main_warehouse).await.unwrap(), 0);
    assert!(!ledger
        .is_below_minimum(item, app.main_warehouse)
        .await
        .unwrap());
    assert_matches!(
        ledger.adjust(item, app.main_warehouse, -1).await,
        Err(ServiceError::InsufficientStock(_))
    );
}

#[tokio::test]
async fn minimum_threshold_flags_low_stock() {
    let app = TestApp::new();
    let ledger = app.state.stock_ledger();
    let item = Uuid::new_v4();

    ledger.adjust(item, app.main_warehouse, 10).await.unwrap();
    ledger.set_minimum(item, app.main_warehouse, 5).await.unwrap();
    assert!(!ledger
        .is_below_minimum(item, app.main_warehouse)
        .await
        .unwrap());

    ledger.adjust(item, app.main_warehouse, -6).await.unwrap();
    assert!(ledger
        .is_below_minimum(item, app.main_warehouse)
        .await
        .unwrap());

    assert_matches!(
        ledger.set_minimum(item, app.main_warehouse, -1).await,
        Err(ServiceError::InvalidQuantity(_))
    );
}

// 20 concurrent withdrawals of 1 unit against a stock of 10: exactly 10 may
// succeed and the quantity must land on 0, not below.
#[tokio::test]
async fn concurrent_adjusts_never_go_negative() {
    let app = TestApp::new();
    let item = Uuid::new_v4();
    app.seed_stock(item, app.main_warehouse, 10).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let ledger = app.state.stock_ledger();
        let location = app.main_warehouse;
        tasks.push(tokio::spawn(async move {
            ledger.adjust(item, location, -1).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 10);
    assert_eq!(app.stock(item, app.main_warehouse).await, 0);
}

// The same guarantee across subsystems: five commissions racing to mark the
// same article ready can only place as many holds as there is stock.
#[tokio::test]
async fn concurrent_ready_toggles_share_one_stock_pool() {
    let app = TestApp::new();
    let item = app.seed_item("Cable duct", "CD-100");
    app.seed_stock(item.id, app.main_warehouse, 3).await;
    let commissions = app.state.commission_service();

    let mut ids = Vec::new();
    for i in 0..5 {
        let commission = commissions
            .create_commission(CreateCommissionRequest {
                name: format!("Site {}", i),
                order_number: format!("C-{}", 100 + i),
                notes: None,
                created_by: "m.weber".to_string(),
                items: vec![CommissionItem::main_warehouse(
                    item.id,
                    item.name.clone(),
                    item.item_number.clone(),
                )],
            })
            .await
            .unwrap();
        ids.push((commission.id, commission.items[0].id));
    }

    let mut tasks = Vec::new();
    for (commission_id, item_id) in ids {
        let commissions = commissions.clone();
        tasks.push(tokio::spawn(async move {
            commissions
                .toggle_item_ready(commission_id, item_id)
                .await
                .map(|c| c.status)
        }));
    }

    let mut ready = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(status) => {
                assert_eq!(status, CommissionStatus::Ready);
                ready += 1;
            }
            Err(ServiceError::InsufficientStock(_)) => rejected += 1,
            Err(other) => panic!("unexpected failure: {}", other),
        }
    }

    assert_eq!(ready, 3);
    assert_eq!(rejected, 2);
    assert_eq!(app.stock(item.id, app.main_warehouse).await, 0);
}

#[tokio::test]
async fn concurrent_receipts_on_one_order_stay_consistent() {
    let app = TestApp::new();
    let item = app.seed_item("Cable duct", "CD-100");
    let order = app
        .confirmed_order(Uuid::new_v4(), "B-3001", None, &[(item.id, 10)])
        .await;

    // Ten racing receipts of 2 each; the per-order lock serializes them, the
    // cap stops the line at 10 and the ledger moves in lockstep.
    let mut tasks = Vec::new();
    for _ in 0..10 {
        let orders = app.state.order_service();
        let order_id = order.id;
        let item_id = item.id;
        tasks.push(tokio::spawn(async move {
            orders.receive_item(order_id, item_id, 2, false).await.is_ok()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let order = app.state.order_service().get_order(order.id).await.unwrap();
    assert_eq!(order.items[0].received_quantity, 10);
    assert_eq!(app.stock(item.id, app.main_warehouse).await, 10);
}
