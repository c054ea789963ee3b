use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::catalog::CatalogItem;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::commission::{
    Commission, CommissionItem, CommissionItemStatus, CommissionStatus, ItemSource,
};
use crate::store::CommissionStore;

use super::stock_ledger::StockLedger;
use super::KeyedLocks;

/// Request to create a new commission pick-list.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCommissionRequest {
    /// Display name, e.g. the job or site the material is assembled for.
    #[validate(length(min = 1, message = "Commission name is required"))]
    pub name: String,

    /// Customer-facing order number the commission belongs to.
    pub order_number: String,

    /// Optional free-form notes.
    pub notes: Option<String>,

    /// Who assembled the commission.
    pub created_by: String,

    /// Seed lines, e.g. when reopening a saved draft.
    pub items: Vec<CommissionItem>,
}

/// Drives commission pick-lists from draft through readiness to withdrawal.
///
/// Marking a main-warehouse line ready places a stock hold of exactly its
/// quantity at the main warehouse via the shared [`StockLedger`]; un-marking
/// or removing the line releases the hold again. Commission records are
/// serialized per commission id.
#[derive(Clone)]
pub struct CommissionService {
    store: Arc<dyn CommissionStore>,
    ledger: Arc<StockLedger>,
    config: Arc<AppConfig>,
    event_sender: Option<Arc<EventSender>>,
    locks: Arc<KeyedLocks<Uuid>>,
}

impl CommissionService {
    pub fn new(
        store: Arc<dyn CommissionStore>,
        ledger: Arc<StockLedger>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            event_sender,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Creates a commission; its initial status is derived from the seed
    /// items. No stock moves here, even for seed lines already marked ready
    /// (those represent holds placed before the draft was saved).
    #[instrument(skip(self, request), fields(name = %request.name, order_number = %request.order_number))]
    pub async fn create_commission(
        &self,
        request: CreateCommissionRequest,
    ) -> Result<Commission, ServiceError> {
        request.validate()?;

        let mut items = request.items;
        for item in &mut items {
            item.quantity = self.config.clamp_quantity(item.quantity);
        }
        let commission = Commission::new(
            request.name,
            request.order_number,
            request.notes,
            request.created_by,
            items,
        );
        self.store.put_commission(&commission).await?;

        counter!("commissions.created", 1);
        info!(
            commission_id = %commission.id,
            name = %commission.name,
            status = %commission.status,
            item_count = commission.items.len(),
            "Commission created successfully"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CommissionCreated(commission.id))
                .await;
        }

        Ok(commission)
    }

    /// Adds a catalog item to the pick-list, snapshotting its name and
    /// number. Adding an item that is already listed bumps that line's
    /// quantity by one instead of creating a second line.
    #[instrument(skip(self, catalog_item), fields(commission_id = %commission_id, item_id = %catalog_item.id))]
    pub async fn add_main_warehouse_item(
        &self,
        commission_id: Uuid,
        catalog_item: CatalogItem,
    ) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        Self::ensure_active(&commission)?;

        let item_id = catalog_item.id;
        match commission
            .items
            .iter()
            .position(|item| item.id == item_id)
        {
            Some(idx) => {
                if commission.items[idx].is_ready() {
                    return Err(ServiceError::InvalidTransition(format!(
                        "item {} on commission {} is ready; un-ready it before changing its quantity",
                        item_id, commission_id
                    )));
                }
                commission.items[idx].quantity =
                    (commission.items[idx].quantity + 1).min(self.config.max_item_quantity);
            }
            None => {
                commission.items.push(CommissionItem::main_warehouse(
                    catalog_item.id,
                    catalog_item.name,
                    catalog_item.item_number,
                ));
            }
        }

        let (old_status, new_status) = Self::apply_derived_status(&mut commission);
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(
            commission_id = %commission_id,
            item_id = %item_id,
            "Item added to commission"
        );
        self.notify_item_change(
            Event::CommissionItemAdded {
                commission_id,
                item_id,
            },
            commission_id,
            old_status,
            new_status,
        )
        .await;

        Ok(commission)
    }

    /// Adds a placeholder line for material that still has to be ordered at
    /// the named wholesaler. Placeholders never touch the ledger.
    #[instrument(skip(self), fields(commission_id = %commission_id, wholesaler_name = %wholesaler_name))]
    pub async fn add_external_placeholder(
        &self,
        commission_id: Uuid,
        wholesaler_name: &str,
    ) -> Result<Commission, ServiceError> {
        if wholesaler_name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "wholesaler name must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        Self::ensure_active(&commission)?;

        let item = CommissionItem::external_placeholder(wholesaler_name.trim().to_string());
        let item_id = item.id;
        commission.items.push(item);

        let (old_status, new_status) = Self::apply_derived_status(&mut commission);
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(
            commission_id = %commission_id,
            item_id = %item_id,
            wholesaler_name = %wholesaler_name,
            "External placeholder added to commission"
        );
        self.notify_item_change(
            Event::CommissionItemAdded {
                commission_id,
                item_id,
            },
            commission_id,
            old_status,
            new_status,
        )
        .await;

        Ok(commission)
    }

    /// Updates a line's quantity, clamped into the configured range. Ready
    /// lines hold stock for exactly their quantity, so they must be
    /// un-readied before the quantity can change.
    #[instrument(skip(self), fields(commission_id = %commission_id, item_id = %item_id, quantity = quantity))]
    pub async fn update_item_quantity(
        &self,
        commission_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        Self::ensure_active(&commission)?;

        let clamped = self.config.clamp_quantity(quantity);
        let idx = commission
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("commission item", item_id))?;
        if commission.items[idx].is_ready() {
            return Err(ServiceError::InvalidTransition(format!(
                "item {} on commission {} is ready; un-ready it before changing its quantity",
                item_id, commission_id
            )));
        }
        commission.items[idx].quantity = clamped;
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(
            commission_id = %commission_id,
            item_id = %item_id,
            quantity = clamped,
            "Commission item quantity updated"
        );
        Ok(commission)
    }

    /// Records the delivery reference for an externally ordered line.
    #[instrument(skip(self, transaction_number), fields(commission_id = %commission_id, item_id = %item_id))]
    pub async fn set_item_transaction_number(
        &self,
        commission_id: Uuid,
        item_id: Uuid,
        transaction_number: Option<String>,
    ) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        Self::ensure_active(&commission)?;

        let item = commission
            .item_mut(item_id)
            .ok_or_else(|| ServiceError::record_not_found("commission item", item_id))?;
        item.transaction_number = transaction_number;
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(
            commission_id = %commission_id,
            item_id = %item_id,
            "Commission item transaction number updated"
        );
        Ok(commission)
    }

    /// Removes a line. A ready main-warehouse line has its stock hold
    /// released first, so removal never leaves a phantom deduction behind.
    #[instrument(skip(self), fields(commission_id = %commission_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        commission_id: Uuid,
        item_id: Uuid,
    ) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        Self::ensure_active(&commission)?;

        let idx = commission
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("commission item", item_id))?;
        if commission.items[idx].is_ready()
            && commission.items[idx].source == ItemSource::MainWarehouse
        {
            self.ledger
                .adjust(
                    item_id,
                    self.config.main_warehouse_location_id,
                    commission.items[idx].quantity,
                )
                .await?;
        }
        commission.items.remove(idx);

        let (old_status, new_status) = Self::apply_derived_status(&mut commission);
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(
            commission_id = %commission_id,
            item_id = %item_id,
            "Item removed from commission"
        );
        self.notify_item_change(
            Event::CommissionItemRemoved {
                commission_id,
                item_id,
            },
            commission_id,
            old_status,
            new_status,
        )
        .await;

        Ok(commission)
    }

    /// Flips a line between `pending` and `ready`.
    ///
    /// For main-warehouse lines the flip is coupled to the ledger: marking
    /// ready deducts the line's quantity at the main warehouse, un-marking
    /// restores it, so toggling twice is a no-op on stock. A deduction
    /// rejected for insufficient stock leaves the line pending.
    #[instrument(skip(self), fields(commission_id = %commission_id, item_id = %item_id))]
    pub async fn toggle_item_ready(
        &self,
        commission_id: Uuid,
        item_id: Uuid,
    ) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        Self::ensure_active(&commission)?;

        let idx = commission
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| ServiceError::record_not_found("commission item", item_id))?;
        let making_ready = commission.items[idx].status == CommissionItemStatus::Pending;
        let quantity = commission.items[idx].quantity;

        // Ledger first: if the deduction fails the line stays pending.
        if commission.items[idx].source == ItemSource::MainWarehouse {
            let delta = if making_ready { -quantity } else { quantity };
            self.ledger
                .adjust(item_id, self.config.main_warehouse_location_id, delta)
                .await?;
        }

        commission.items[idx].status = if making_ready {
            CommissionItemStatus::Ready
        } else {
            CommissionItemStatus::Pending
        };

        let (old_status, new_status) = Self::apply_derived_status(&mut commission);
        commission.touch();
        self.store.put_commission(&commission).await?;

        if making_ready {
            counter!("commissions.items_ready", 1);
        } else {
            counter!("commissions.items_unready", 1);
        }
        info!(
            commission_id = %commission_id,
            item_id = %item_id,
            quantity = quantity,
            ready = making_ready,
            "Commission item readiness toggled"
        );
        let event = if making_ready {
            Event::CommissionItemReady {
                commission_id,
                item_id,
                quantity,
            }
        } else {
            Event::CommissionItemUnready {
                commission_id,
                item_id,
                quantity,
            }
        };
        self.notify_item_change(event, commission_id, old_status, new_status)
            .await;

        Ok(commission)
    }

    /// Clears the one-shot attention flag raised when a commission turns
    /// ready. Purely cosmetic, so there is no status precondition.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn clear_newly_ready(&self, commission_id: Uuid) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        commission.is_newly_ready = false;
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(commission_id = %commission_id, "Commission newly-ready flag cleared");
        Ok(commission)
    }

    /// Withdraws the commission: the material physically leaves with the
    /// fitter. Valid from `ready`, or from an empty `draft` that never held
    /// anything. Stock is untouched; the holds were placed at ready-time.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn withdraw(&self, commission_id: Uuid) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;

        let can_withdraw = commission.status == CommissionStatus::Ready
            || (commission.status == CommissionStatus::Draft && commission.items.is_empty());
        if !can_withdraw {
            return Err(ServiceError::InvalidTransition(format!(
                "commission {} is {}, only ready commissions or empty drafts can be withdrawn",
                commission_id, commission.status
            )));
        }

        let old_status = commission.status;
        commission.status = CommissionStatus::Withdrawn;
        commission.withdrawn_at = Some(Utc::now());
        commission.touch();
        self.store.put_commission(&commission).await?;

        counter!("commissions.withdrawn", 1);
        info!(commission_id = %commission_id, "Commission withdrawn");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CommissionWithdrawn(commission_id))
                .await;
            sender
                .send_or_log(Event::CommissionStatusChanged {
                    commission_id,
                    old_status: old_status.to_string(),
                    new_status: commission.status.to_string(),
                })
                .await;
        }

        Ok(commission)
    }

    /// Brings a withdrawn commission back into preparation. The earlier
    /// withdrawal was final with respect to inventory, so stock stays as it
    /// is.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn reactivate(&self, commission_id: Uuid) -> Result<Commission, ServiceError> {
        let _guard = self.locks.acquire(commission_id).await;
        let mut commission = self.load_commission(commission_id).await?;
        if !commission.is_withdrawn() {
            return Err(ServiceError::InvalidTransition(format!(
                "commission {} is {}, only withdrawn commissions can be reactivated",
                commission_id, commission.status
            )));
        }

        let old_status = commission.status;
        commission.status = CommissionStatus::Preparing;
        commission.withdrawn_at = None;
        commission.touch();
        self.store.put_commission(&commission).await?;

        info!(commission_id = %commission_id, "Commission reactivated");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CommissionReactivated(commission_id))
                .await;
            sender
                .send_or_log(Event::CommissionStatusChanged {
                    commission_id,
                    old_status: old_status.to_string(),
                    new_status: commission.status.to_string(),
                })
                .await;
        }

        Ok(commission)
    }

    pub async fn get_commission(&self, commission_id: Uuid) -> Result<Commission, ServiceError> {
        self.load_commission(commission_id).await
    }

    /// All commissions, oldest first.
    pub async fn list_commissions(&self) -> Result<Vec<Commission>, ServiceError> {
        let mut commissions = self.store.list_commissions().await?;
        commissions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(commissions)
    }

    async fn load_commission(&self, commission_id: Uuid) -> Result<Commission, ServiceError> {
        self.store
            .get_commission(commission_id)
            .await?
            .ok_or_else(|| ServiceError::record_not_found("commission", commission_id))
    }

    fn ensure_active(commission: &Commission) -> Result<(), ServiceError> {
        if commission.is_withdrawn() {
            return Err(ServiceError::InvalidTransition(format!(
                "commission {} is withdrawn; reactivate it before editing",
                commission.id
            )));
        }
        Ok(())
    }

    /// Re-derives the aggregate status after an item mutation and raises the
    /// newly-ready flag on the transition into `ready`. Leaving `ready`
    /// preserves whatever flag value was present.
    fn apply_derived_status(commission: &mut Commission) -> (CommissionStatus, CommissionStatus) {
        let old_status = commission.status;
        let new_status = CommissionStatus::derive_from_items(&commission.items);
        if new_status == CommissionStatus::Ready && old_status != CommissionStatus::Ready {
            commission.is_newly_ready = true;
        }
        commission.status = new_status;
        (old_status, new_status)
    }

    async fn notify_item_change(
        &self,
        event: Event,
        commission_id: Uuid,
        old_status: CommissionStatus,
        new_status: CommissionStatus,
    ) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
            if new_status != old_status {
                sender
                    .send_or_log(Event::CommissionStatusChanged {
                        commission_id,
                        old_status: old_status.to_string(),
                        new_status: new_status.to_string(),
                    })
                    .await;
            }
        }
    }
}
