//! Canonical order model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fulfillment status of an order as reported by the POS.
///
/// Only terminal-successful states are sale-eligible; everything else must
/// never reach the analytics engine as a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    Submitted,
    Preparing,
    Completed,
    Ready,
    Cancelled,
    /// Statuses this build does not know about yet; carried verbatim
    Unknown(String),
}

impl FulfillmentStatus {
    /// Terminal-successful states only
    pub fn is_sale_eligible(&self) -> bool {
        matches!(self, FulfillmentStatus::Completed | FulfillmentStatus::Ready)
    }

    /// Parse a provider status string, tolerating common aliases
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "new" => FulfillmentStatus::Pending,
            "submitted" | "placed" => FulfillmentStatus::Submitted,
            "preparing" | "in_progress" | "processing" => FulfillmentStatus::Preparing,
            "completed" | "complete" | "fulfilled" | "picked_up" => FulfillmentStatus::Completed,
            "ready" | "ready_for_pickup" => FulfillmentStatus::Ready,
            "cancelled" | "canceled" | "void" | "voided" => FulfillmentStatus::Cancelled,
            other => FulfillmentStatus::Unknown(other.to_string()),
        }
    }
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// References the menu item's provider-scoped `external_id`
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// An order normalized for persistence and analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Provider-prefixed id, globally unique across sources
    pub order_id: String,
    pub customer_id: String,
    pub items: Vec<OrderLineItem>,
    pub total_amount: Decimal,
    /// Unix millis
    pub purchased_at: i64,
    #[serde(default)]
    pub bundle_ids: Vec<String>,
    pub status: FulfillmentStatus,
}
