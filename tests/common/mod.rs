#![allow(dead_code)]

use std::sync::Arc;

use fulfillment_core::catalog::{CatalogItem, InMemoryCatalog};
use fulfillment_core::config::AppConfig;
use fulfillment_core::events::Event;
use fulfillment_core::models::order::Order;
use fulfillment_core::services::orders::{CreateOrderRequest, OrderItemRequest};
use fulfillment_core::store::InMemoryStore;
use fulfillment_core::AppState;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness wiring the engine over in-memory stores and a seeded
/// catalog. The event receiver is kept on hand instead of being consumed by
/// the processing loop, so tests can assert on emitted events directly.
pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<InMemoryCatalog>,
    pub events: mpsc::Receiver<Event>,
    pub main_warehouse: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let config = Arc::new(AppConfig::default());
        let main_warehouse = config.main_warehouse_location_id;

        let (state, events) = AppState::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            catalog.clone(),
            config,
        );

        Self {
            state,
            catalog,
            events,
            main_warehouse,
        }
    }

    /// Registers a catalog item and returns it.
    pub fn seed_item(&self, name: &str, number: &str) -> CatalogItem {
        let item = CatalogItem::new(name, number);
        self.catalog.insert(item.clone());
        item
    }

    /// Registers a catalog item that also carries a wholesaler-assigned
    /// number.
    pub fn seed_item_for(
        &self,
        name: &str,
        number: &str,
        wholesaler_id: Uuid,
        wholesaler_number: &str,
    ) -> CatalogItem {
        let item = CatalogItem::new(name, number).with_wholesaler_number(wholesaler_id, wholesaler_number);
        self.catalog.insert(item.clone());
        item
    }

    /// Books starting stock for an item.
    pub async fn seed_stock(&self, item_id: Uuid, location_id: Uuid, quantity: i32) {
        self.state
            .stock_ledger()
            .adjust(item_id, location_id, quantity)
            .await
            .expect("seed stock");
    }

    pub async fn stock(&self, item_id: Uuid, location_id: Uuid) -> i32 {
        self.state
            .stock_ledger()
            .quantity_at(item_id, location_id)
            .await
            .expect("read stock")
    }

    /// Creates and confirms an order in one step.
    pub async fn confirmed_order(
        &self,
        wholesaler_id: Uuid,
        order_number: &str,
        location_id: Option<Uuid>,
        items: &[(Uuid, i32)],
    ) -> Order {
        let order = self
            .state
            .order_service()
            .create_order(CreateOrderRequest {
                wholesaler_id,
                order_number: order_number.to_string(),
                location_id,
                items: items
                    .iter()
                    .map(|&(item_id, quantity)| OrderItemRequest { item_id, quantity })
                    .collect(),
            })
            .await
            .expect("create order");
        self.state
            .order_service()
            .confirm_order(order.id)
            .await
            .expect("confirm order")
    }

    /// Drains every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
