use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured delivery note as produced by the external OCR/AI collaborator.
/// The core has no opinion on how this was extracted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedDeliveryNote {
    /// Order number the collaborator read off the note.
    pub claimed_order_number: String,
    pub lines: Vec<DeliveryLine>,
}

/// One free-text-derived candidate line of a delivery note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLine {
    /// Whatever identified the item on paper: an item id, the wholesaler's
    /// item number, or a close misreading of either.
    pub item_identifier: String,
    pub delivered_quantity: i32,
}

/// Classification of one order line against the delivery note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MatchStatus {
    /// Delivered quantity equals the outstanding quantity.
    Ok,
    /// Delivered, but less than outstanding.
    Partial,
    /// Delivered more than outstanding, or not on the order at all.
    Extra,
    /// Not on this delivery.
    Missing,
}

/// One reconciled line of the report: an order item paired with what the
/// delivery note claims for it, or an unmatched candidate line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedLine {
    /// `None` for candidate lines that matched no order item.
    pub item_id: Option<Uuid>,

    /// Order-item name, or the raw identifier for unmatched candidates.
    pub item_name: String,

    pub ordered_quantity: i32,

    /// Outstanding quantity at match time; what `delivered_quantity` is
    /// classified against.
    pub remaining_quantity: i32,

    pub delivered_quantity: i32,

    pub match_status: MatchStatus,
}

/// Result of matching one parsed delivery note against one open order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub order_id: Uuid,
    pub order_number: String,
    pub lines: Vec<MatchedLine>,

    /// True when every matched order line classified `Ok`; missing lines do
    /// not block, they simply were not on this delivery.
    pub is_full_receipt_possible: bool,

    pub matched_at: DateTime<Utc>,
}

/// Canonical form for item identity comparison: trimmed, lowercased, all
/// non-alphanumerics stripped, leading zeros dropped. Delivery notes quote
/// the same number as "47-110 200", "47110200" or "0047110200" depending on
/// the wholesaler's print layout.
pub fn normalize_identifier(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    cleaned.trim_start_matches('0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("47-110 200", "47110200")]
    #[case("  ABC-123  ", "abc123")]
    #[case("0047110200", "47110200")]
    #[case("Art.Nr. 88/12", "artnr8812")]
    #[case("000", "")]
    #[case("", "")]
    fn normalizes_identifiers(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_identifier(raw), expected);
    }

    #[test]
    fn normalized_forms_collide_across_print_layouts() {
        let a = normalize_identifier("47-110 200");
        let b = normalize_identifier(" 0047110200");
        assert_eq!(a, b);
    }

    #[test]
    fn match_status_serializes_kebab_case() {
        let json = serde_json::to_string(&MatchStatus::Missing).unwrap();
        assert_eq!(json, "\"missing\"");
    }
}
