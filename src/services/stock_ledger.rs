use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, histogram};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::stock::{StockKey, StockRecord};
use crate::store::StockStore;

use super::KeyedLocks;

/// Owns every stock quantity in the system. All mutation goes through
/// [`StockLedger::adjust`], which serializes writers per (item, location)
/// key; the order and commission managers hold a handle to this service and
/// never touch stock records directly.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn StockStore>,
    locks: Arc<KeyedLocks<StockKey>>,
    event_sender: Option<Arc<EventSender>>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn StockStore>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            store,
            locks: Arc::new(KeyedLocks::new()),
            event_sender,
        }
    }

    /// Applies `delta` to the stock of one item at one location and returns
    /// the new quantity. All-or-nothing: a delta that would take the
    /// quantity negative fails with `InsufficientStock` and leaves the
    /// record untouched.
    #[instrument(skip(self), fields(item_id = %item_id, location_id = %location_id, delta = delta))]
    pub async fn adjust(
        &self,
        item_id: Uuid,
        location_id: Uuid,
        delta: i32,
    ) -> Result<i32, ServiceError> {
        let key = StockKey::new(item_id, location_id);
        let _guard = self.locks.acquire(key).await;

        let mut record = self
            .store
            .get_stock(&key)
            .await?
            .unwrap_or_else(|| StockRecord::new(item_id, location_id));

        let old_quantity = record.quantity;
        let new_quantity = old_quantity + delta;
        if new_quantity < 0 {
            warn!(
                item_id = %item_id,
                location_id = %location_id,
                quantity = old_quantity,
                delta = delta,
                "Rejected stock adjustment that would go negative"
            );
            return Err(ServiceError::InsufficientStock(format!(
                "item {} at location {} has {} units, cannot apply delta {}",
                item_id, location_id, old_quantity, delta
            )));
        }

        record.quantity = new_quantity;
        record.updated_at = Utc::now();
        self.store.put_stock(&record).await?;

        counter!("stock.adjustments", 1);
        histogram!("stock.adjustment_size", delta.unsigned_abs() as f64);

        info!(
            item_id = %item_id,
            location_id = %location_id,
            old_quantity = old_quantity,
            new_quantity = new_quantity,
            "Stock adjusted"
        );

        if record.is_below_minimum() {
            warn!(
                item_id = %item_id,
                location_id = %location_id,
                quantity = new_quantity,
                minimum = record.minimum_quantity,
                "Stock below configured minimum"
            );
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockAdjusted {
                    item_id,
                    location_id,
                    old_quantity,
                    new_quantity,
                })
                .await;
            if record.is_below_minimum() {
                sender
                    .send_or_log(Event::LowStockDetected {
                        item_id,
                        location_id,
                        quantity: new_quantity,
                        minimum_quantity: record.minimum_quantity,
                    })
                    .await;
            }
        }

        Ok(new_quantity)
    }

    /// Current quantity at a location; 0 when no record exists.
    pub async fn quantity_at(&self, item_id: Uuid, location_id: Uuid) -> Result<i32, ServiceError> {
        let key = StockKey::new(item_id, location_id);
        Ok(self
            .store
            .get_stock(&key)
            .await?
            .map(|record| record.quantity)
            .unwrap_or(0))
    }

    /// Whether the item's quantity has fallen below its configured minimum.
    pub async fn is_below_minimum(
        &self,
        item_id: Uuid,
        location_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let key = StockKey::new(item_id, location_id);
        Ok(self
            .store
            .get_stock(&key)
            .await?
            .map(|record| record.is_below_minimum())
            .unwrap_or(false))
    }

    /// Sets the reorder threshold, creating an empty record when none
    /// exists. This is the catalog sync job's write path for minimums.
    #[instrument(skip(self), fields(item_id = %item_id, location_id = %location_id, minimum = minimum))]
    pub async fn set_minimum(
        &self,
        item_id: Uuid,
        location_id: Uuid,
        minimum: i32,
    ) -> Result<(), ServiceError> {
        if minimum < 0 {
            return Err(ServiceError::InvalidQuantity(format!(
                "minimum quantity must not be negative, got {}",
                minimum
            )));
        }

        let key = StockKey::new(item_id, location_id);
        let _guard = self.locks.acquire(key).await;

        let mut record = self
            .store
            .get_stock(&key)
            .await?
            .unwrap_or_else(|| StockRecord::new(item_id, location_id));
        record.minimum_quantity = minimum;
        record.updated_at = Utc::now();
        self.store.put_stock(&record).await?;

        if record.is_below_minimum() {
            warn!(
                item_id = %item_id,
                location_id = %location_id,
                quantity = record.quantity,
                minimum = minimum,
                "Stock below newly configured minimum"
            );
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::LowStockDetected {
                        item_id,
                        location_id,
                        quantity: record.quantity,
                        minimum_quantity: minimum,
                    })
                    .await;
            }
        }

        Ok(())
    }

    /// Full record read for dashboards; `None` when nothing has ever been
    /// booked for the key.
    pub async fn record(
        &self,
        item_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<StockRecord>, ServiceError> {
        let key = StockKey::new(item_id, location_id);
        Ok(self.store.get_stock(&key).await?)
    }
}
