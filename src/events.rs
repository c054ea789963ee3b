use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    /// State changes must never be rolled back over a lost notification.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderConfirmed(Uuid),
    OrderItemsAdded {
        order_id: Uuid,
        item_count: usize,
    },
    OrderItemReceived {
        order_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        location_id: Uuid,
    },
    OrderItemCommissioned {
        order_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CommissionedItemLoaded {
        order_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        location_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Stock events
    StockAdjusted {
        item_id: Uuid,
        location_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
    },
    LowStockDetected {
        item_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        minimum_quantity: i32,
    },

    // Reorder bridge events
    ReorderArranged {
        item_id: Uuid,
        location_id: Uuid,
        requested_quantity: i32,
    },
    ReorderCleared {
        item_id: Uuid,
        location_id: Uuid,
    },

    // Commission events
    CommissionCreated(Uuid),
    CommissionItemAdded {
        commission_id: Uuid,
        item_id: Uuid,
    },
    CommissionItemRemoved {
        commission_id: Uuid,
        item_id: Uuid,
    },
    CommissionItemReady {
        commission_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CommissionItemUnready {
        commission_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CommissionStatusChanged {
        commission_id: Uuid,
        old_status: String,
        new_status: String,
    },
    CommissionWithdrawn(Uuid),
    CommissionReactivated(Uuid),

    // Reconciliation events
    DeliveryNoteMatched {
        order_id: Uuid,
        line_count: usize,
        full_receipt_possible: bool,
    },
    DeliveryNoteBooked {
        order_id: Uuid,
        line_count: usize,
    },
}

// Function to process incoming events. Deployments that want to fan events
// out further (webhooks, sync triggers) replace this loop with their own
// consumer on the same channel.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::LowStockDetected {
                item_id,
                location_id,
                quantity,
                minimum_quantity,
            } => {
                warn!(
                    "Low stock alert: item {} at location {} has {} units (minimum {})",
                    item_id, location_id, quantity, minimum_quantity
                );
            }
            Event::OrderStatusChanged {
                order_id,
                ref old_status,
                ref new_status,
            } => {
                info!(
                    "Order {} moved from {} to {}",
                    order_id, old_status, new_status
                );
            }
            Event::CommissionStatusChanged {
                commission_id,
                ref old_status,
                ref new_status,
            } => {
                info!(
                    "Commission {} moved from {} to {}",
                    commission_id, old_status, new_status
                );
            }
            Event::DeliveryNoteMatched {
                order_id,
                line_count,
                full_receipt_possible,
            } => {
                info!(
                    "Delivery note matched against order {}: {} lines, full receipt possible: {}",
                    order_id, line_count, full_receipt_possible
                );
            }
            _ => {
                info!("Received event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}
