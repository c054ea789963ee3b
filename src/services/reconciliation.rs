use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::delivery::{
    normalize_identifier, MatchStatus, MatchedLine, ParsedDeliveryNote, ReconciliationReport,
};
use crate::models::order::Order;

use super::orders::OrderService;

/// Matches externally parsed delivery notes against open orders and books
/// clean matches automatically.
///
/// The matcher sits above the [`OrderService`] and never touches stock or
/// order records itself; committing a report issues one ordinary
/// `receive_item` call per bookable line.
#[derive(Clone)]
pub struct ReconciliationService {
    orders: Arc<OrderService>,
    catalog: Arc<dyn Catalog>,
    event_sender: Option<Arc<EventSender>>,
}

impl ReconciliationService {
    pub fn new(
        orders: Arc<OrderService>,
        catalog: Arc<dyn Catalog>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            orders,
            catalog,
            event_sender,
        }
    }

    /// Matches a parsed delivery note against the open order it claims to
    /// belong to and classifies every line.
    ///
    /// Candidate lines are resolved through an alias index built from each
    /// order line's item id, its snapshotted wholesaler number and whatever
    /// numbers the catalog currently knows. Lines the index cannot resolve
    /// are reported as informational `extra` entries without an item id.
    /// The note is bookable in full when every order line that found a
    /// candidate matched its outstanding quantity exactly; lines the note
    /// does not mention stay open for manual receipt.
    #[instrument(skip(self, note), fields(claimed_order_number = %note.claimed_order_number, line_count = note.lines.len()))]
    pub async fn match_delivery_note(
        &self,
        note: &ParsedDeliveryNote,
    ) -> Result<ReconciliationReport, ServiceError> {
        let order = self
            .orders
            .get_order_by_number(&note.claimed_order_number)
            .await?
            .filter(Order::is_open)
            .ok_or_else(|| {
                ServiceError::OrderNotFound(format!(
                    "no open order matches delivery note number {}",
                    note.claimed_order_number
                ))
            })?;

        let mut catalog_items = HashMap::new();
        for item in &order.items {
            if let Some(catalog_item) = self.catalog.item(item.item_id).await? {
                catalog_items.insert(item.item_id, catalog_item);
            }
        }
        let index = build_alias_index(&order, &catalog_items);

        // Sum deliveries per resolved item; a note sometimes lists the same
        // article on several lines.
        let mut delivered: HashMap<Uuid, i32> = HashMap::new();
        let mut unmatched: Vec<(String, i32)> = Vec::new();
        for line in &note.lines {
            let quantity = line.delivered_quantity.max(0);
            match index.get(&normalize_identifier(&line.item_identifier)) {
                Some(&item_id) => *delivered.entry(item_id).or_insert(0) += quantity,
                None => unmatched.push((line.item_identifier.clone(), quantity)),
            }
        }

        let mut lines = Vec::with_capacity(order.items.len() + unmatched.len());
        let mut full_receipt_possible = true;
        for item in &order.items {
            let remaining = item.remaining_quantity();
            let delivered_quantity = delivered.get(&item.item_id).copied().unwrap_or(0);
            let match_status = if delivered_quantity == 0 {
                MatchStatus::Missing
            } else if delivered_quantity == remaining {
                MatchStatus::Ok
            } else if delivered_quantity < remaining {
                MatchStatus::Partial
            } else {
                MatchStatus::Extra
            };
            if matches!(match_status, MatchStatus::Partial | MatchStatus::Extra) {
                full_receipt_possible = false;
            }
            lines.push(MatchedLine {
                item_id: Some(item.item_id),
                item_name: item.item_name.clone(),
                ordered_quantity: item.ordered_quantity,
                remaining_quantity: remaining,
                delivered_quantity,
                match_status,
            });
        }
        for (identifier, quantity) in unmatched {
            lines.push(MatchedLine {
                item_id: None,
                item_name: identifier,
                ordered_quantity: 0,
                remaining_quantity: 0,
                delivered_quantity: quantity,
                match_status: MatchStatus::Extra,
            });
        }

        let report = ReconciliationReport {
            order_id: order.id,
            order_number: order.order_number.clone(),
            lines,
            is_full_receipt_possible: full_receipt_possible,
            matched_at: Utc::now(),
        };

        counter!("reconciliation.notes_matched", 1);
        info!(
            order_id = %order.id,
            line_count = report.lines.len(),
            full_receipt_possible = full_receipt_possible,
            "Delivery note matched against order"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::DeliveryNoteMatched {
                    order_id: order.id,
                    line_count: report.lines.len(),
                    full_receipt_possible,
                })
                .await;
        }

        Ok(report)
    }

    /// Books every bookable line of a clean report as an ordinary receipt.
    ///
    /// Each line is an independent receipt; the caller wraps the batch in
    /// its own transaction if it needs all-or-nothing semantics across
    /// lines. A report that has gone stale since matching surfaces the
    /// first failing receipt unchanged.
    #[instrument(skip(self, report), fields(order_id = %report.order_id, line_count = report.lines.len()))]
    pub async fn commit_full_receipt(
        &self,
        report: &ReconciliationReport,
    ) -> Result<Order, ServiceError> {
        if !report.is_full_receipt_possible {
            return Err(ServiceError::InvalidOperation(
                "delivery note does not fully match the order; book the lines manually".to_string(),
            ));
        }

        let order = self.orders.get_order(report.order_id).await?;
        if !order.is_open() {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is {} and cannot take deliveries",
                order.id, order.status
            )));
        }

        let mut booked = 0usize;
        let mut latest = order;
        for line in &report.lines {
            let item_id = match line.item_id {
                Some(id) => id,
                None => continue,
            };
            if line.match_status == MatchStatus::Missing || line.delivered_quantity <= 0 {
                continue;
            }
            latest = self
                .orders
                .receive_item(report.order_id, item_id, line.delivered_quantity, false)
                .await?;
            booked += 1;
        }

        counter!("reconciliation.full_receipts", 1);
        info!(
            order_id = %report.order_id,
            lines_booked = booked,
            "Delivery note booked in full"
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::DeliveryNoteBooked {
                    order_id: report.order_id,
                    line_count: booked,
                })
                .await;
        }

        Ok(latest)
    }
}

/// Maps every known alias of the order's items to the owning item id.
///
/// Aliases are the item id itself, the wholesaler number snapshotted onto
/// the order line, and the house and wholesaler numbers the catalog knows
/// today. All aliases are normalized; an alias claimed by two items stays
/// with the first, in order-line order.
pub(crate) fn build_alias_index(
    order: &Order,
    catalog_items: &HashMap<Uuid, CatalogItem>,
) -> HashMap<String, Uuid> {
    let mut index = HashMap::new();
    for item in &order.items {
        let mut aliases: Vec<String> = vec![
            item.item_id.to_string(),
            item.wholesaler_item_number.clone(),
        ];
        if let Some(catalog_item) = catalog_items.get(&item.item_id) {
            aliases.push(catalog_item.item_number.clone());
            aliases.extend(catalog_item.wholesaler_numbers.values().cloned());
        }
        for alias in aliases {
            let normalized = normalize_identifier(&alias);
            if normalized.is_empty() {
                continue;
            }
            index.entry(normalized).or_insert(item.item_id);
        }
    }
    index
}
