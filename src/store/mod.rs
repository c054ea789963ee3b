// Injected persistence seam. The core treats storage as a key-value store
// with last-write-wins semantics per aggregate id; callers plug in whatever
// backend their deployment syncs against.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::commission::Commission;
use crate::models::order::Order;
use crate::models::stock::{ReorderEntry, StockKey, StockRecord};

pub mod memory;

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn find_order_by_number(&self, order_number: &str)
        -> Result<Option<Order>, StoreError>;
    async fn put_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait CommissionStore: Send + Sync {
    async fn get_commission(&self, id: Uuid) -> Result<Option<Commission>, StoreError>;
    async fn put_commission(&self, commission: &Commission) -> Result<(), StoreError>;
    async fn list_commissions(&self) -> Result<Vec<Commission>, StoreError>;
}

#[async_trait]
pub trait StockStore: Send + Sync {
    async fn get_stock(&self, key: &StockKey) -> Result<Option<StockRecord>, StoreError>;
    async fn put_stock(&self, record: &StockRecord) -> Result<(), StoreError>;
    async fn list_stock(&self) -> Result<Vec<StockRecord>, StoreError>;
}

#[async_trait]
pub trait ReorderStore: Send + Sync {
    async fn get_reorder(&self, key: &StockKey) -> Result<Option<ReorderEntry>, StoreError>;
    async fn put_reorder(&self, entry: &ReorderEntry) -> Result<(), StoreError>;
    async fn delete_reorder(&self, key: &StockKey) -> Result<(), StoreError>;
    async fn list_reorders(&self) -> Result<Vec<ReorderEntry>, StoreError>;
}
