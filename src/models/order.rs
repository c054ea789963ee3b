use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enum representing the possible statuses of a wholesaler order.
///
/// `Draft` is the only status a caller can hold an order in directly; every
/// other value is derived from the item list via
/// [`OrderStatus::derive_from_items`] and recomputed after each mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OrderStatus {
    Draft,
    Ordered,
    PartiallyReceived,
    PartiallyCommissioned,
    Received,
}

impl OrderStatus {
    /// Recomputes the status of a confirmed order from its items.
    ///
    /// Rules, checked in this sequence: every item `received` or
    /// `commissioned` yields `Received`; any `commissioned` item yields
    /// `PartiallyCommissioned`; any received quantity at all yields
    /// `PartiallyReceived`; otherwise the order is still plain `Ordered`.
    /// Draft orders are not subject to derivation.
    pub fn derive_from_items(items: &[OrderItem]) -> Self {
        if !items.is_empty()
            && items.iter().all(|item| {
                matches!(
                    item.status,
                    OrderItemStatus::Received | OrderItemStatus::Commissioned
                )
            })
        {
            return OrderStatus::Received;
        }
        if items
            .iter()
            .any(|item| item.status == OrderItemStatus::Commissioned)
        {
            return OrderStatus::PartiallyCommissioned;
        }
        if items.iter().any(|item| item.received_quantity > 0) {
            return OrderStatus::PartiallyReceived;
        }
        OrderStatus::Ordered
    }
}

/// Enum representing the possible statuses of a single order line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OrderItemStatus {
    /// Waiting for delivery.
    Pending,
    /// Fully delivered and booked into a location.
    Received,
    /// Delivered but earmarked for a vehicle, not booked anywhere yet.
    Commissioned,
}

/// A single line of a wholesaler order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Catalog item this line orders.
    pub item_id: Uuid,

    /// Item name as the catalog read when the order was drafted.
    pub item_name: String,

    /// Wholesaler-assigned item number snapshot, as printed on delivery notes.
    pub wholesaler_item_number: String,

    /// Quantity ordered from the wholesaler.
    pub ordered_quantity: i32,

    /// Quantity received so far; never exceeds `ordered_quantity`.
    pub received_quantity: i32,

    /// Current status of the line.
    pub status: OrderItemStatus,
}

impl OrderItem {
    pub fn new(
        item_id: Uuid,
        item_name: String,
        wholesaler_item_number: String,
        ordered_quantity: i32,
    ) -> Self {
        Self {
            item_id,
            item_name,
            wholesaler_item_number,
            ordered_quantity,
            received_quantity: 0,
            status: OrderItemStatus::Pending,
        }
    }

    /// Quantity still outstanding on this line.
    pub fn remaining_quantity(&self) -> i32 {
        self.ordered_quantity - self.received_quantity
    }
}

/// A replenishment order placed with a wholesaler.
///
/// Orders are never deleted; a fully settled order stays around as the
/// receipt history for its items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Primary key: unique identifier for the order.
    pub id: Uuid,

    /// Unique order number, supplied by the caller and quoted on delivery
    /// notes.
    pub order_number: String,

    /// Wholesaler the order was placed with.
    pub wholesaler_id: Uuid,

    /// Destination vehicle location; `None` means the main warehouse.
    pub location_id: Option<Uuid>,

    /// Current status of the order.
    pub status: OrderStatus,

    /// Timestamp of confirmation; `None` while the order is a draft.
    pub ordered_at: Option<DateTime<Utc>>,

    /// Order lines.
    pub items: Vec<OrderItem>,

    /// Timestamp when the order was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp when the order was last updated.
    pub updated_at: Option<DateTime<Utc>>,

    /// Save counter, incremented on every mutation.
    pub version: i32,
}

impl Order {
    /// Creates a new draft order with the specified lines.
    pub fn new(
        order_number: String,
        wholesaler_id: Uuid,
        location_id: Option<Uuid>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            wholesaler_id,
            location_id,
            status: OrderStatus::Draft,
            ordered_at: None,
            items,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    /// True for orders destined for a vehicle rather than the main warehouse.
    pub fn is_vehicle_order(&self) -> bool {
        self.location_id.is_some()
    }

    /// True while the order can still take deliveries.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Ordered
                | OrderStatus::PartiallyReceived
                | OrderStatus::PartiallyCommissioned
        )
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|item| item.item_id == item_id)
    }

    /// Re-derives the status from the items unless the order is still a
    /// draft.
    pub fn refresh_status(&mut self) {
        if self.status != OrderStatus::Draft {
            self.status = OrderStatus::derive_from_items(&self.items);
        }
    }

    /// Stamps the update time and bumps the save counter.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn line(status: OrderItemStatus, ordered: i32, received: i32) -> OrderItem {
        let mut item = OrderItem::new(
            Uuid::new_v4(),
            "Widget".to_string(),
            "WGT-001".to_string(),
            ordered,
        );
        item.status = status;
        item.received_quantity = received;
        item
    }

    #[rstest]
    #[case(vec![line(OrderItemStatus::Pending, 10, 0)], OrderStatus::Ordered)]
    #[case(vec![line(OrderItemStatus::Pending, 10, 4)], OrderStatus::PartiallyReceived)]
    #[case(
        vec![line(OrderItemStatus::Received, 10, 10), line(OrderItemStatus::Pending, 5, 0)],
        OrderStatus::PartiallyReceived
    )]
    #[case(
        vec![line(OrderItemStatus::Commissioned, 10, 0), line(OrderItemStatus::Pending, 5, 0)],
        OrderStatus::PartiallyCommissioned
    )]
    #[case(
        vec![line(OrderItemStatus::Commissioned, 10, 0), line(OrderItemStatus::Pending, 5, 2)],
        OrderStatus::PartiallyCommissioned
    )]
    #[case(vec![line(OrderItemStatus::Received, 10, 10)], OrderStatus::Received)]
    #[case(
        vec![line(OrderItemStatus::Received, 10, 10), line(OrderItemStatus::Commissioned, 5, 0)],
        OrderStatus::Received
    )]
    fn derives_status_from_items(#[case] items: Vec<OrderItem>, #[case] expected: OrderStatus) {
        assert_eq!(OrderStatus::derive_from_items(&items), expected);
    }

    #[test]
    fn draft_orders_are_not_rederived() {
        let mut order = Order::new(
            "B-1001".to_string(),
            Uuid::new_v4(),
            None,
            vec![line(OrderItemStatus::Pending, 10, 4)],
        );
        order.refresh_status();
        assert_eq!(order.status, OrderStatus::Draft);
    }

    #[test]
    fn statuses_serialize_kebab_case() {
        let json = serde_json::to_string(&OrderStatus::PartiallyReceived).unwrap();
        assert_eq!(json, "\"partially-received\"");
        let json = serde_json::to_string(&OrderStatus::PartiallyCommissioned).unwrap();
        assert_eq!(json, "\"partially-commissioned\"");
    }

    #[test]
    fn remaining_quantity_tracks_receipts() {
        let item = line(OrderItemStatus::Pending, 10, 4);
        assert_eq!(item.remaining_quantity(), 6);
    }
}
