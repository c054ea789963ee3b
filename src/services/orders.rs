use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::order::{Order, OrderItem, OrderItemStatus, OrderStatus};
use crate::models::stock::{ReorderEntry, ReorderPhase, StockKey};
use crate::store::{OrderStore, ReorderStore};

use super::stock_ledger::StockLedger;
use super::KeyedLocks;

/// Request to create a new replenishment order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Wholesaler the order is placed with.
    pub wholesaler_id: Uuid,

    /// Caller-supplied order number, unique across all orders.
    #[validate(length(min = 1, message = "Order number is required"))]
    pub order_number: String,

    /// Destination vehicle location; `None` means the main warehouse.
    pub location_id: Option<Uuid>,

    /// Initial order lines.
    #[validate]
    pub items: Vec<OrderItemRequest>,
}

/// One candidate line for an order, referencing a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub item_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

/// Drives replenishment orders from draft through confirmation to full
/// receipt, and maintains the reorder bridge entries that link
/// below-minimum suggestions to the orders that pick them up.
///
/// All stock movement caused by receipts goes through the shared
/// [`StockLedger`]; order records themselves are serialized per order id so
/// concurrent receipts on one order cannot interleave.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    reorder_store: Arc<dyn ReorderStore>,
    ledger: Arc<StockLedger>,
    catalog: Arc<dyn Catalog>,
    config: Arc<AppConfig>,
    event_sender: Option<Arc<EventSender>>,
    locks: Arc<KeyedLocks<Uuid>>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        reorder_store: Arc<dyn ReorderStore>,
        ledger: Arc<StockLedger>,
        catalog: Arc<dyn Catalog>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            reorder_store,
            ledger,
            catalog,
            config,
            event_sender,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Creates a draft order, snapshotting item names and wholesaler numbers
    /// from the catalog so later catalog edits do not rewrite order history.
    /// Arranged reorder entries for the ordered items are linked to the new
    /// order.
    #[instrument(skip(self, request), fields(order_number = %request.order_number, wholesaler_id = %request.wholesaler_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ServiceError> {
        request.validate()?;

        if request.items.is_empty() {
            return Err(ServiceError::EmptyOrder);
        }
        if self
            .store
            .find_order_by_number(&request.order_number)
            .await?
            .is_some()
        {
            return Err(ServiceError::InvalidInput(format!(
                "order number {} is already in use",
                request.order_number
            )));
        }

        let items = self
            .snapshot_items(request.wholesaler_id, &request.items)
            .await?;
        let order = Order::new(
            request.order_number,
            request.wholesaler_id,
            request.location_id,
            items,
        );
        self.store.put_order(&order).await?;
        self.link_reorder_entries(&order, None).await;

        counter!("orders.created", 1);
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            item_count = order.items.len(),
            "Order created successfully"
        );
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderCreated(order.id)).await;
        }

        Ok(order)
    }

    /// Appends lines to a draft, merging quantities for items already on the
    /// order. `location_id` names the arranged-reorder location the new
    /// lines were picked from; `None` means the main warehouse.
    #[instrument(skip(self, items), fields(order_id = %order_id, item_count = items.len()))]
    pub async fn add_items_to_order(
        &self,
        order_id: Uuid,
        items: Vec<OrderItemRequest>,
        location_id: Option<Uuid>,
    ) -> Result<Order, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "no items supplied to add".to_string(),
            ));
        }

        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, items can only be added to drafts",
                order_id, order.status
            )));
        }

        let added = self.snapshot_items(order.wholesaler_id, &items).await?;
        let ceiling = self.config.max_item_quantity;
        for line in added {
            match order.item_mut(line.item_id) {
                Some(existing) => {
                    existing.ordered_quantity =
                        (existing.ordered_quantity + line.ordered_quantity).min(ceiling);
                }
                None => order.items.push(line),
            }
        }
        order.touch();
        self.store.put_order(&order).await?;
        self.link_reorder_entries(&order, location_id).await;

        info!(
            order_id = %order_id,
            item_count = order.items.len(),
            "Items added to draft order"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderItemsAdded {
                    order_id,
                    item_count: order.items.len(),
                })
                .await;
        }

        Ok(order)
    }

    /// Updates a draft line's quantity, clamped into the configured range.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id, quantity = quantity))]
    pub async fn update_draft_item_quantity(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, quantities can only be edited on drafts",
                order_id, order.status
            )));
        }

        let clamped = self.config.clamp_quantity(quantity);
        let item = order
            .item_mut(item_id)
            .ok_or_else(|| ServiceError::record_not_found("order item", item_id))?;
        item.ordered_quantity = clamped;
        order.touch();
        self.store.put_order(&order).await?;

        info!(
            order_id = %order_id,
            item_id = %item_id,
            quantity = clamped,
            "Draft item quantity updated"
        );
        Ok(order)
    }

    /// Removes a line from a draft. Drafts may become empty; only
    /// confirmation requires at least one line.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn remove_item_from_draft(
        &self,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, items can only be removed from drafts",
                order_id, order.status
            )));
        }

        let idx = order
            .items
            .iter()
            .position(|item| item.item_id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("order item", item_id))?;
        order.items.remove(idx);
        order.touch();
        self.store.put_order(&order).await?;

        info!(order_id = %order_id, item_id = %item_id, "Item removed from draft order");
        Ok(order)
    }

    /// Confirms a draft, moving it to `ordered` and stamping the order time.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn confirm_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {}, only drafts can be confirmed",
                order_id, order.status
            )));
        }
        if order.items.is_empty() {
            return Err(ServiceError::EmptyOrder);
        }

        let old_status = order.status;
        order.status = OrderStatus::Ordered;
        order.ordered_at = Some(Utc::now());
        order.touch();
        self.store.put_order(&order).await?;

        counter!("orders.confirmed", 1);
        info!(order_id = %order_id, order_number = %order.order_number, "Order confirmed");
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderConfirmed(order_id)).await;
            sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: order.status.to_string(),
                })
                .await;
        }

        Ok(order)
    }

    /// Books a delivery against one order line.
    ///
    /// With `commission_only` set (vehicle orders only) the line is flagged
    /// `commissioned` for its entire remaining quantity and the ledger is
    /// left alone; the material sits in the warehouse earmarked for the
    /// vehicle until [`OrderService::load_commissioned_item`] books it.
    /// Otherwise the received quantity grows by `quantity`, capped at the
    /// ordered quantity, and the same amount is booked into the order's
    /// target location.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id, quantity = quantity, commission_only = commission_only))]
    pub async fn receive_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        commission_only: bool,
    ) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load_order(order_id).await?;
        if !order.is_open() {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {} and cannot take deliveries",
                order_id, order.status
            )));
        }

        if commission_only {
            return self.commission_item(order, item_id).await;
        }

        if quantity <= 0 {
            return Err(ServiceError::InvalidQuantity(format!(
                "received quantity must be positive, got {}",
                quantity
            )));
        }

        let idx = order
            .items
            .iter()
            .position(|item| item.item_id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("order item", item_id))?;
        match order.items[idx].status {
            OrderItemStatus::Commissioned => {
                return Err(ServiceError::InvalidTransition(format!(
                    "item {} on order {} is commissioned; load it onto the vehicle instead",
                    item_id, order_id
                )));
            }
            OrderItemStatus::Received => {
                return Err(ServiceError::InvalidTransition(format!(
                    "item {} on order {} is already fully received",
                    item_id, order_id
                )));
            }
            OrderItemStatus::Pending => {}
        }

        let location_id = order
            .location_id
            .unwrap_or(self.config.main_warehouse_location_id);
        let effective = quantity.min(order.items[idx].remaining_quantity());
        let old_status = order.status;

        // Stock moves first; a failed ledger write leaves the order record
        // untouched.
        self.ledger.adjust(item_id, location_id, effective).await?;

        let item = &mut order.items[idx];
        item.received_quantity += effective;
        if item.received_quantity >= item.ordered_quantity {
            item.status = OrderItemStatus::Received;
        }
        order.refresh_status();
        order.touch();
        self.store.put_order(&order).await?;
        self.clear_reorder_if_settled(&order, item_id).await;

        counter!("orders.items_received", 1);
        info!(
            order_id = %order_id,
            item_id = %item_id,
            quantity = effective,
            location_id = %location_id,
            "Order item received"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderItemReceived {
                    order_id,
                    item_id,
                    quantity: effective,
                    location_id,
                })
                .await;
            if order.status != old_status {
                sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id,
                        old_status: old_status.to_string(),
                        new_status: order.status.to_string(),
                    })
                    .await;
            }
        }

        Ok(order)
    }

    /// Books a commissioned line onto the order's vehicle: the outstanding
    /// quantity lands in the vehicle location and the line flips to
    /// `received`. Valid regardless of overall order status, since an order
    /// whose every line is commissioned already derives as `received`.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn load_commissioned_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load_order(order_id).await?;

        let location_id = order.location_id.ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "order {} has no vehicle location to load onto",
                order_id
            ))
        })?;

        let idx = order
            .items
            .iter()
            .position(|item| item.item_id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("order item", item_id))?;
        if order.items[idx].status != OrderItemStatus::Commissioned {
            return Err(ServiceError::InvalidTransition(format!(
                "item {} on order {} is {}, only commissioned items can be loaded",
                item_id, order_id, order.items[idx].status
            )));
        }

        let loaded = order.items[idx].remaining_quantity();
        let old_status = order.status;

        self.ledger.adjust(item_id, location_id, loaded).await?;

        let item = &mut order.items[idx];
        item.received_quantity = item.ordered_quantity;
        item.status = OrderItemStatus::Received;
        order.refresh_status();
        order.touch();
        self.store.put_order(&order).await?;
        self.clear_reorder_if_settled(&order, item_id).await;

        counter!("orders.items_loaded", 1);
        info!(
            order_id = %order_id,
            item_id = %item_id,
            quantity = loaded,
            location_id = %location_id,
            "Commissioned item loaded onto vehicle"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CommissionedItemLoaded {
                    order_id,
                    item_id,
                    quantity: loaded,
                    location_id,
                })
                .await;
            if order.status != old_status {
                sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id,
                        old_status: old_status.to_string(),
                        new_status: order.status.to_string(),
                    })
                    .await;
            }
        }

        Ok(order)
    }

    /// Flags an item for reordering at a location. A suggestion already
    /// picked up by an order is left as it stands.
    #[instrument(skip(self), fields(item_id = %item_id, location_id = %location_id, quantity = quantity))]
    pub async fn mark_item_arranged(
        &self,
        item_id: Uuid,
        location_id: Uuid,
        quantity: i32,
    ) -> Result<ReorderEntry, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidQuantity(format!(
                "requested quantity must be positive, got {}",
                quantity
            )));
        }

        let key = StockKey::new(item_id, location_id);
        if let Some(existing) = self.reorder_store.get_reorder(&key).await? {
            if existing.phase == ReorderPhase::Ordered {
                return Ok(existing);
            }
        }

        let entry = ReorderEntry::arranged(
            item_id,
            location_id,
            quantity.min(self.config.max_item_quantity),
        );
        self.reorder_store.put_reorder(&entry).await?;

        counter!("reorders.arranged", 1);
        info!(
            item_id = %item_id,
            location_id = %location_id,
            quantity = entry.requested_quantity,
            "Item arranged for reorder"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ReorderArranged {
                    item_id,
                    location_id,
                    requested_quantity: entry.requested_quantity,
                })
                .await;
        }

        Ok(entry)
    }

    /// Clears arranged suggestions for the listed items at a location and
    /// returns how many were cleared. Entries already linked to an order are
    /// untouched.
    #[instrument(skip(self, item_ids), fields(location_id = %location_id, item_count = item_ids.len()))]
    pub async fn cancel_arranged_order(
        &self,
        item_ids: &[Uuid],
        location_id: Uuid,
    ) -> Result<usize, ServiceError> {
        let mut cleared = 0;
        for &item_id in item_ids {
            if self.remove_single_item_from_arranged(item_id, location_id).await? {
                cleared += 1;
            }
        }
        info!(
            location_id = %location_id,
            cleared = cleared,
            "Arranged reorder suggestions cancelled"
        );
        Ok(cleared)
    }

    /// Clears one arranged suggestion. Returns `false` when there was no
    /// arranged-phase entry for the key.
    pub async fn remove_single_item_from_arranged(
        &self,
        item_id: Uuid,
        location_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let key = StockKey::new(item_id, location_id);
        match self.reorder_store.get_reorder(&key).await? {
            Some(entry) if entry.phase == ReorderPhase::Arranged => {
                self.reorder_store.delete_reorder(&key).await?;
                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::ReorderCleared {
                            item_id,
                            location_id,
                        })
                        .await;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Reorder bridge state for one key; `None` when nothing is in flight.
    pub async fn reorder_state(
        &self,
        item_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<ReorderEntry>, ServiceError> {
        let key = StockKey::new(item_id, location_id);
        Ok(self.reorder_store.get_reorder(&key).await?)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.load_order(order_id).await
    }

    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, ServiceError> {
        Ok(self.store.find_order_by_number(order_number).await?)
    }

    /// Orders still able to take deliveries, ordered by order number.
    pub async fn open_orders(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .store
            .list_orders()
            .await?
            .into_iter()
            .filter(Order::is_open)
            .collect();
        orders.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        Ok(orders)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders = self.store.list_orders().await?;
        orders.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        Ok(orders)
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::record_not_found("order", order_id))
    }

    /// Resolves candidate lines against the catalog, merging duplicates and
    /// snapshotting the name and the wholesaler's item number.
    async fn snapshot_items(
        &self,
        wholesaler_id: Uuid,
        items: &[OrderItemRequest],
    ) -> Result<Vec<OrderItem>, ServiceError> {
        let ceiling = self.config.max_item_quantity;
        let mut lines: Vec<OrderItem> = Vec::with_capacity(items.len());
        for request in items {
            if request.quantity <= 0 {
                return Err(ServiceError::InvalidQuantity(format!(
                    "ordered quantity must be positive, got {} for item {}",
                    request.quantity, request.item_id
                )));
            }
            let quantity = self.config.clamp_quantity(request.quantity);
            if let Some(line) = lines.iter_mut().find(|line| line.item_id == request.item_id) {
                line.ordered_quantity = (line.ordered_quantity + quantity).min(ceiling);
                continue;
            }
            let item = self
                .catalog
                .item(request.item_id)
                .await?
                .ok_or_else(|| ServiceError::record_not_found("catalog item", request.item_id))?;
            let wholesaler_number = item.number_for_wholesaler(wholesaler_id).to_string();
            lines.push(OrderItem::new(
                request.item_id,
                item.name,
                wholesaler_number,
                quantity,
            ));
        }
        Ok(lines)
    }

    /// Commission path of [`OrderService::receive_item`]: flags the whole
    /// outstanding quantity as earmarked without touching the ledger.
    async fn commission_item(
        &self,
        mut order: Order,
        item_id: Uuid,
    ) -> Result<Order, ServiceError> {
        if !order.is_vehicle_order() {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} delivers to the main warehouse; commissioning only applies to vehicle orders",
                order.id
            )));
        }

        let idx = order
            .items
            .iter()
            .position(|item| item.item_id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("order item", item_id))?;
        match order.items[idx].status {
            OrderItemStatus::Received => {
                return Err(ServiceError::InvalidTransition(format!(
                    "item {} on order {} is already fully received",
                    item_id, order.id
                )));
            }
            OrderItemStatus::Commissioned => {
                return Err(ServiceError::InvalidTransition(format!(
                    "item {} on order {} is already commissioned",
                    item_id, order.id
                )));
            }
            OrderItemStatus::Pending => {}
        }

        let remaining = order.items[idx].remaining_quantity();
        let old_status = order.status;
        order.items[idx].status = OrderItemStatus::Commissioned;
        order.refresh_status();
        order.touch();
        self.store.put_order(&order).await?;
        self.clear_reorder_if_settled(&order, item_id).await;

        counter!("orders.items_commissioned", 1);
        info!(
            order_id = %order.id,
            item_id = %item_id,
            quantity = remaining,
            "Order item commissioned for vehicle loading"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderItemCommissioned {
                    order_id: order.id,
                    item_id,
                    quantity: remaining,
                })
                .await;
            if order.status != old_status {
                sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id: order.id,
                        old_status: old_status.to_string(),
                        new_status: order.status.to_string(),
                    })
                    .await;
            }
        }

        Ok(order)
    }

    /// Flips arranged reorder suggestions for this order's items to the
    /// ordered phase and links them to the order. Best-effort: the order is
    /// already saved, so a failing bridge write is logged rather than
    /// surfaced.
    async fn link_reorder_entries(&self, order: &Order, location_id: Option<Uuid>) {
        let location_id = location_id
            .or(order.location_id)
            .unwrap_or(self.config.main_warehouse_location_id);
        for item in &order.items {
            let key = StockKey::new(item.item_id, location_id);
            let entry = match self.reorder_store.get_reorder(&key).await {
                Ok(Some(entry)) if entry.phase == ReorderPhase::Arranged => entry,
                Ok(_) => continue,
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        item_id = %item.item_id,
                        error = %e,
                        "Failed to read reorder entry while linking"
                    );
                    continue;
                }
            };
            let mut entry = entry;
            entry.phase = ReorderPhase::Ordered;
            entry.order_id = Some(order.id);
            entry.updated_at = Utc::now();
            if let Err(e) = self.reorder_store.put_reorder(&entry).await {
                warn!(
                    order_id = %order.id,
                    item_id = %item.item_id,
                    error = %e,
                    "Failed to link reorder entry to order"
                );
            } else {
                info!(
                    order_id = %order.id,
                    item_id = %item.item_id,
                    location_id = %location_id,
                    "Reorder suggestion picked up by order"
                );
            }
        }
    }

    /// Drops the reorder entry for a line once that line has settled
    /// (received or commissioned). Best-effort for the same reason as
    /// linking: the receipt has already been committed.
    async fn clear_reorder_if_settled(&self, order: &Order, item_id: Uuid) {
        let settled = order
            .item(item_id)
            .map(|item| item.status != OrderItemStatus::Pending)
            .unwrap_or(false);
        if !settled {
            return;
        }

        let location_id = order
            .location_id
            .unwrap_or(self.config.main_warehouse_location_id);
        let key = StockKey::new(item_id, location_id);
        match self.reorder_store.get_reorder(&key).await {
            Ok(Some(entry)) if entry.order_id == Some(order.id) => {
                if let Err(e) = self.reorder_store.delete_reorder(&key).await {
                    warn!(
                        order_id = %order.id,
                        item_id = %item_id,
                        error = %e,
                        "Failed to clear settled reorder entry"
                    );
                    return;
                }
                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::ReorderCleared {
                            item_id,
                            location_id,
                        })
                        .await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    item_id = %item_id,
                    error = %e,
                    "Failed to read reorder entry while clearing"
                );
            }
        }
    }
}
