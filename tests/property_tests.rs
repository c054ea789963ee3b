//! Property-based tests for the fulfillment core invariants.
//!
//! These use proptest to check the ledger and status-derivation rules across
//! a wide range of inputs, catching edge cases the scenario tests miss.

mod common;

use common::TestApp;
use fulfillment_core::models::commission::{
    CommissionItem, CommissionItemStatus, CommissionStatus,
};
use fulfillment_core::models::delivery::normalize_identifier;
use fulfillment_core::models::order::{OrderItem, OrderItemStatus, OrderStatus};
use proptest::prelude::*;
use uuid::Uuid;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

// Strategies for generating test data
fn order_item_strategy() -> impl Strategy<Value = OrderItem> {
    (
        1i32..1_000,
        prop_oneof![
            Just(OrderItemStatus::Pending),
            Just(OrderItemStatus::Received),
            Just(OrderItemStatus::Commissioned),
        ],
        0i32..1_000,
    )
        .prop_map(|(ordered, status, received)| {
            let mut item = OrderItem::new(
                Uuid::new_v4(),
                "Item".to_string(),
                "NR-1".to_string(),
                ordered,
            );
            item.status = status;
            item.received_quantity = match status {
                OrderItemStatus::Received => ordered,
                _ => received.min(ordered),
            };
            item
        })
}

fn commission_item_strategy() -> impl Strategy<Value = CommissionItem> {
    prop_oneof![
        Just(CommissionItemStatus::Pending),
        Just(CommissionItemStatus::Ready),
    ]
    .prop_map(|status| {
        let mut item =
            CommissionItem::main_warehouse(Uuid::new_v4(), "Item".to_string(), "NR-1".to_string());
        item.status = status;
        item
    })
}

fn delta_sequence_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-50i32..50, 1..40)
}

// Property: order status derivation matches its aggregate definition
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn order_status_never_derives_draft(items in prop::collection::vec(order_item_strategy(), 0..8)) {
        prop_assert_ne!(OrderStatus::derive_from_items(&items), OrderStatus::Draft);
    }

    #[test]
    fn order_status_received_iff_all_lines_settled(
        items in prop::collection::vec(order_item_strategy(), 1..8)
    ) {
        let derived = OrderStatus::derive_from_items(&items);
        let all_settled = items
            .iter()
            .all(|i| matches!(i.status, OrderItemStatus::Received | OrderItemStatus::Commissioned));
        prop_assert_eq!(derived == OrderStatus::Received, all_settled);
    }

    #[test]
    fn commission_status_tracks_item_readiness(
        items in prop::collection::vec(commission_item_strategy(), 0..8)
    ) {
        let derived = CommissionStatus::derive_from_items(&items);
        if items.is_empty() {
            prop_assert_eq!(derived, CommissionStatus::Draft);
        } else if items.iter().all(CommissionItem::is_ready) {
            prop_assert_eq!(derived, CommissionStatus::Ready);
        } else {
            prop_assert_eq!(derived, CommissionStatus::Preparing);
        }
    }
}

// Property: identifier normalization is stable and layout-insensitive
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn normalization_is_idempotent(raw in ".{0,40}") {
        let once = normalize_identifier(&raw);
        prop_assert_eq!(normalize_identifier(&once), once.clone());
        prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        prop_assert!(!once.starts_with('0'));
    }

    #[test]
    fn normalization_ignores_separators(digits in "[1-9][0-9]{3,9}") {
        let spaced = format!("{} {}", &digits[..2], &digits[2..]);
        let dashed = format!("{}-{}", &digits[..2], &digits[2..]);
        prop_assert_eq!(normalize_identifier(&spaced), normalize_identifier(&digits));
        prop_assert_eq!(normalize_identifier(&dashed), normalize_identifier(&digits));
    }
}

// Property: for all adjust sequences the quantity equals the model of
// accepted deltas and never goes negative
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_follows_the_accepted_delta_model(deltas in delta_sequence_strategy()) {
        runtime().block_on(async {
            let app = TestApp::new();
            let ledger = app.state.stock_ledger();
            let item = Uuid::new_v4();

            let mut model = 0i32;
            for delta in deltas {
                match ledger.adjust(item, app.main_warehouse, delta).await {
                    Ok(new_quantity) => {
                        model += delta;
                        prop_assert!(new_quantity >= 0);
                        prop_assert_eq!(new_quantity, model);
                    }
                    Err(_) => {
                        // Rejected adjustments must leave the quantity alone.
                        prop_assert!(model + delta < 0);
                    }
                }
            }

            let quantity = ledger.quantity_at(item, app.main_warehouse).await.unwrap();
            prop_assert_eq!(quantity, model);
            Ok(())
        })?;
    }

    #[test]
    fn received_quantity_is_monotonic_and_capped(
        quantities in prop::collection::vec(-5i32..30, 1..12)
    ) {
        runtime().block_on(async {
            let app = TestApp::new();
            let item = app.seed_item("Cable duct", "CD-100");
            let order = app
                .confirmed_order(Uuid::new_v4(), "B-7001", None, &[(item.id, 25)])
                .await;
            let orders = app.state.order_service();

            let mut previous = 0;
            for quantity in quantities {
                let _ = orders.receive_item(order.id, item.id, quantity, false).await;
                let current = orders.get_order(order.id).await.unwrap().items[0].received_quantity;
                prop_assert!(current >= previous);
                prop_assert!(current <= 25);
                previous = current;
            }

            // Ledger bookings mirror the received quantity exactly.
            let stock = app.stock(item.id, app.main_warehouse).await;
            prop_assert_eq!(stock, previous);
            Ok(())
        })?;
    }

    #[test]
    fn ready_toggle_pairs_are_stock_neutral(toggle_pairs in 1usize..6, quantity in 1i32..20) {
        runtime().block_on(async {
            let app = TestApp::new();
            let item = app.seed_item("Cable duct", "CD-100");
            app.seed_stock(item.id, app.main_warehouse, quantity).await;
            let commissions = app.state.commission_service();

            let mut line = CommissionItem::main_warehouse(
                item.id,
                item.name.clone(),
                item.item_number.clone(),
            );
            line.quantity = quantity;
            let commission = commissions
                .create_commission(
                    fulfillment_core::services::commissions::CreateCommissionRequest {
                        name: "Site".to_string(),
                        order_number: "C-7001".to_string(),
                        notes: None,
                        created_by: "m.weber".to_string(),
                        items: vec![line],
                    },
                )
                .await
                .unwrap();
            let item_id = commission.items[0].id;

            for _ in 0..toggle_pairs {
                let ready = commissions
                    .toggle_item_ready(commission.id, item_id)
                    .await
                    .unwrap();
                prop_assert_eq!(ready.status, CommissionStatus::Ready);
                prop_assert_eq!(app.stock(item.id, app.main_warehouse).await, 0);

                let reverted = commissions
                    .toggle_item_ready(commission.id, item_id)
                    .await
                    .unwrap();
                prop_assert_eq!(reverted.status, CommissionStatus::Preparing);
                prop_assert_eq!(app.stock(item.id, app.main_warehouse).await, quantity);
            }
            Ok(())
        })?;
    }
}
