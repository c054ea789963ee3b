use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger key: one stock record per item per location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub item_id: Uuid,
    pub location_id: Uuid,
}

impl StockKey {
    pub fn new(item_id: Uuid, location_id: Uuid) -> Self {
        Self {
            item_id,
            location_id,
        }
    }
}

/// Quantity of one item at one location. Owned exclusively by the stock
/// ledger; nothing else writes these records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub item_id: Uuid,
    pub location_id: Uuid,

    /// On-hand quantity; never negative.
    pub quantity: i32,

    /// Reorder threshold; a quantity below this flags the item.
    pub minimum_quantity: i32,

    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn new(item_id: Uuid, location_id: Uuid) -> Self {
        Self {
            item_id,
            location_id,
            quantity: 0,
            minimum_quantity: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.item_id, self.location_id)
    }

    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.minimum_quantity
    }
}

/// Where a reorder suggestion stands. Absence of an entry means no reorder
/// is in flight for the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReorderPhase {
    /// Flagged for reordering; no order exists yet.
    Arranged,
    /// A draft order has picked the suggestion up.
    Ordered,
}

/// Bridges below-minimum detection to order creation: an item flagged as
/// `Arranged` turns `Ordered` once a draft order includes it, and the entry
/// is cleared when that order line is fully received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub phase: ReorderPhase,
    pub requested_quantity: i32,

    /// Order that picked the suggestion up, once one exists.
    pub order_id: Option<Uuid>,

    pub updated_at: DateTime<Utc>,
}

impl ReorderEntry {
    pub fn arranged(item_id: Uuid, location_id: Uuid, requested_quantity: i32) -> Self {
        Self {
            item_id,
            location_id,
            phase: ReorderPhase::Arranged,
            requested_quantity,
            order_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.item_id, self.location_id)
    }
}
