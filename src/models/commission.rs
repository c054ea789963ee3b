use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enum representing the lifecycle states of a commission.
///
/// `Draft`, `Preparing` and `Ready` are derived from the item list via
/// [`CommissionStatus::derive_from_items`]; `Withdrawn` is entered and left
/// only through the explicit withdraw/reactivate operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommissionStatus {
    Draft,
    Preparing,
    Ready,
    Withdrawn,
}

impl CommissionStatus {
    /// Recomputes the active-phase status from the item list: no items is a
    /// `Draft`, all items ready is `Ready`, anything else is `Preparing`.
    pub fn derive_from_items(items: &[CommissionItem]) -> Self {
        if items.is_empty() {
            CommissionStatus::Draft
        } else if items
            .iter()
            .all(|item| item.status == CommissionItemStatus::Ready)
        {
            CommissionStatus::Ready
        } else {
            CommissionStatus::Preparing
        }
    }
}

/// Readiness of a single commission line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommissionItemStatus {
    Pending,
    Ready,
}

/// Where a commission line is sourced from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ItemSource {
    /// Picked from main-warehouse stock; marking it ready holds that stock.
    MainWarehouse,
    /// Ordered externally for this job; never touches the ledger.
    ExternalOrder,
}

/// A single line of a commission pick-list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommissionItem {
    /// For main-warehouse lines this is the catalog item id, so adding the
    /// same item twice merges into one line. External placeholders carry a
    /// synthesized id.
    pub id: Uuid,

    /// Display name; for external placeholders the wholesaler to order from.
    pub name: String,

    /// Catalog item number snapshot; empty for external placeholders.
    pub item_number: String,

    /// Source of the material.
    pub source: ItemSource,

    /// Quantity to pick; at least 1.
    pub quantity: i32,

    /// Readiness of the line.
    pub status: CommissionItemStatus,

    /// Delivery reference for externally ordered lines.
    pub transaction_number: Option<String>,
}

impl CommissionItem {
    /// Creates a quantity-1 pending line snapshotting a catalog item.
    pub fn main_warehouse(item_id: Uuid, name: String, item_number: String) -> Self {
        Self {
            id: item_id,
            name,
            item_number,
            source: ItemSource::MainWarehouse,
            quantity: 1,
            status: CommissionItemStatus::Pending,
            transaction_number: None,
        }
    }

    /// Creates a quantity-1 pending placeholder for material yet to be
    /// ordered at the named wholesaler.
    pub fn external_placeholder(wholesaler_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: wholesaler_name,
            item_number: String::new(),
            source: ItemSource::ExternalOrder,
            quantity: 1,
            status: CommissionItemStatus::Pending,
            transaction_number: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == CommissionItemStatus::Ready
    }
}

/// A named pick-list of material assembled for a job and eventually
/// withdrawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    /// Primary key: unique identifier for the commission.
    pub id: Uuid,

    /// Display name, e.g. the job or site it is assembled for.
    pub name: String,

    /// Customer-facing order number this commission belongs to.
    pub order_number: String,

    /// Optional free-form notes.
    pub notes: Option<String>,

    /// Current status; see [`CommissionStatus`].
    pub status: CommissionStatus,

    /// One-shot attention flag raised when the commission turns ready;
    /// cleared independently by the consumer, not by the state machine.
    pub is_newly_ready: bool,

    /// Who assembled the commission.
    pub created_by: String,

    /// Pick-list lines.
    pub items: Vec<CommissionItem>,

    /// Timestamp of withdrawal; `None` while the commission is active.
    pub withdrawn_at: Option<DateTime<Utc>>,

    /// Timestamp when the commission was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp when the commission was last updated.
    pub updated_at: Option<DateTime<Utc>>,

    /// Save counter, incremented on every mutation.
    pub version: i32,
}

impl Commission {
    /// Creates a new commission; the initial status is derived from the
    /// supplied items.
    pub fn new(
        name: String,
        order_number: String,
        notes: Option<String>,
        created_by: String,
        items: Vec<CommissionItem>,
    ) -> Self {
        let status = CommissionStatus::derive_from_items(&items);
        Self {
            id: Uuid::new_v4(),
            name,
            order_number,
            notes,
            status,
            is_newly_ready: false,
            created_by,
            items,
            withdrawn_at: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    pub fn item(&self, item_id: Uuid) -> Option<&CommissionItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut CommissionItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    pub fn is_withdrawn(&self) -> bool {
        self.status == CommissionStatus::Withdrawn
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

    fn line(status: CommissionItemStatus) -> CommissionItem {
        let mut item = CommissionItem::main_warehouse(
            Uuid::new_v4(),
            "Cable tray".to_string(),
            "CT-200".to_string(),
        );
        item.status = status;
        item
    }

    #[rstest]
    #[case(vec![], CommissionStatus::Draft)]
    #[case(vec![line(CommissionItemStatus::Pending)], CommissionStatus::Preparing)]
    #[case(
        vec![line(CommissionItemStatus::Ready), line(CommissionItemStatus::Pending)],
        CommissionStatus::Preparing
    )]
    #[case(
        vec![line(CommissionItemStatus::Ready), line(CommissionItemStatus::Ready)],
        CommissionStatus::Ready
    )]
    fn derives_status_from_items(
        #[case] items: Vec<CommissionItem>,
        #[case] expected: CommissionStatus,
    ) {
        assert_eq!(CommissionStatus::derive_from_items(&items), expected);
    }

    #[test]
    fn new_commission_derives_initial_status() {
        let draft = Commission::new(
            "Site A".to_string(),
            "C-100".to_string(),
            None,
            "m.weber".to_string(),
            vec![],
        );
        assert_eq!(draft.status, CommissionStatus::Draft);
        assert!(!draft.is_newly_ready);

        let ready = Commission::new(
            "Site B".to_string(),
            "C-101".to_string(),
            None,
            "m.weber".to_string(),
            vec![line(CommissionItemStatus::Ready)],
        );
        assert_eq!(ready.status, CommissionStatus::Ready);
        assert!(!ready.is_newly_ready);
    }

    #[test]
    fn external_placeholder_synthesizes_id() {
        let a = CommissionItem::external_placeholder("Voltimum".to_string());
        let b = CommissionItem::external_placeholder("Voltimum".to_string());
        assert_ne!(a.id, b.id);
        assert_eq!(a.source, ItemSource::ExternalOrder);
        assert_eq!(a.quantity, 1);
    }
}
