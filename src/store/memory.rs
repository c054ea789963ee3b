use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::commission::Commission;
use crate::models::order::Order;
use crate::models::stock::{ReorderEntry, StockKey, StockRecord};

use super::{CommissionStore, OrderStore, ReorderStore, StockStore, StoreError};

/// In-memory store for tests and single-process deployments. Writes are
/// last-write-wins, same as the contract a syncing backend provides.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    orders: DashMap<Uuid, Order>,
    commissions: DashMap<Uuid, Commission>,
    stock: DashMap<StockKey, StockRecord>,
    reorders: DashMap<StockKey, ReorderEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .iter()
            .find(|entry| entry.value().order_number == order_number)
            .map(|entry| entry.value().clone()))
    }

    async fn put_order(&self, order: &Order) -> Result<(), StoreError> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl CommissionStore for InMemoryStore {
    async fn get_commission(&self, id: Uuid) -> Result<Option<Commission>, StoreError> {
        Ok(self.commissions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn put_commission(&self, commission: &Commission) -> Result<(), StoreError> {
        self.commissions.insert(commission.id, commission.clone());
        Ok(())
    }

    async fn list_commissions(&self) -> Result<Vec<Commission>, StoreError> {
        Ok(self
            .commissions
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl StockStore for InMemoryStore {
    async fn get_stock(&self, key: &StockKey) -> Result<Option<StockRecord>, StoreError> {
        Ok(self.stock.get(key).map(|entry| entry.value().clone()))
    }

    async fn put_stock(&self, record: &StockRecord) -> Result<(), StoreError> {
        self.stock.insert(record.key(), record.clone());
        Ok(())
    }

    async fn list_stock(&self) -> Result<Vec<StockRecord>, StoreError> {
        Ok(self
            .stock
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl ReorderStore for InMemoryStore {
    async fn get_reorder(&self, key: &StockKey) -> Result<Option<ReorderEntry>, StoreError> {
        Ok(self.reorders.get(key).map(|entry| entry.value().clone()))
    }

    async fn put_reorder(&self, entry: &ReorderEntry) -> Result<(), StoreError> {
        self.reorders.insert(entry.key(), entry.clone());
        Ok(())
    }

    async fn delete_reorder(&self, key: &StockKey) -> Result<(), StoreError> {
        self.reorders.remove(key);
        Ok(())
    }

    async fn list_reorders(&self) -> Result<Vec<ReorderEntry>, StoreError> {
        Ok(self
            .reorders
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
