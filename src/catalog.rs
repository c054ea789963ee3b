//! Catalog collaborator: item name/number/minimum lookups used when
//! snapshotting order and commission lines. Read-only from the core's side.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,

    /// House item number.
    pub item_number: String,

    /// Wholesaler id to the number that wholesaler prints for this item.
    pub wholesaler_numbers: HashMap<Uuid, String>,

    /// Reorder threshold at the main warehouse.
    pub minimum_quantity: i32,
}

impl CatalogItem {
    pub fn new(name: &str, item_number: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            item_number: item_number.to_string(),
            wholesaler_numbers: HashMap::new(),
            minimum_quantity: 0,
        }
    }

    pub fn with_wholesaler_number(mut self, wholesaler_id: Uuid, number: &str) -> Self {
        self.wholesaler_numbers
            .insert(wholesaler_id, number.to_string());
        self
    }

    /// The number this wholesaler knows the item under, falling back to the
    /// house number when none is on file.
    pub fn number_for_wholesaler(&self, wholesaler_id: Uuid) -> &str {
        self.wholesaler_numbers
            .get(&wholesaler_id)
            .map(String::as_str)
            .unwrap_or(&self.item_number)
    }
}

/// Lookup interface the lifecycle managers snapshot from. Reads go through
/// the same persistence contract as the aggregate stores.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn item(&self, id: Uuid) -> Result<Option<CatalogItem>, StoreError>;
}

/// In-memory catalog for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: DashMap<Uuid, CatalogItem>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: CatalogItem) {
        self.items.insert(item.id, item);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn item(&self, id: Uuid) -> Result<Option<CatalogItem>, StoreError> {
        Ok(self.items.get(&id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wholesaler_number_falls_back_to_house_number() {
        let wholesaler = Uuid::new_v4();
        let item = CatalogItem::new("Junction box", "JB-40")
            .with_wholesaler_number(wholesaler, "778 123");

        assert_eq!(item.number_for_wholesaler(wholesaler), "778 123");
        assert_eq!(item.number_for_wholesaler(Uuid::new_v4()), "JB-40");
    }

    #[tokio::test]
    async fn in_memory_catalog_round_trips() {
        let catalog = InMemoryCatalog::new();
        let item = CatalogItem::new("Junction box", "JB-40");
        let id = item.id;
        catalog.insert(item);

        let loaded = catalog.item(id).await.unwrap().unwrap();
        assert_eq!(loaded.item_number, "JB-40");
        assert!(catalog.item(Uuid::new_v4()).await.unwrap().is_none());
    }
}
