//! Canonical menu item

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel brand used when the source record carries none
pub const UNKNOWN_BRAND: &str = "Unknown";

/// A menu/inventory item normalized from a provider's native shape.
///
/// `external_id` + adapter instance uniquely identifies an item.
/// Normalization is idempotent: re-fetching the same upstream record yields
/// a byte-identical canonical item except for the live fields the upstream
/// owns (`stock`, `price`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Provider-scoped id, unique per adapter instance
    pub external_id: String,
    pub name: String,
    /// Defaults to [`UNKNOWN_BRAND`] when the source omits it
    #[serde(default = "default_brand")]
    pub brand: String,
    /// Leaf segment of the provider's hierarchical category string
    pub category: String,
    /// Source currency units
    pub price: Decimal,
    /// Available-to-sell quantity, NOT on-hand quantity
    pub stock: i64,
    pub thc_percent: Option<f64>,
    pub cbd_percent: Option<f64>,
    /// Falls back to a category placeholder when the source has no image
    pub image_url: String,
    /// Opaque passthrough of the original upstream record, for audit
    #[serde(default)]
    pub raw_data: Value,
}

fn default_brand() -> String {
    UNKNOWN_BRAND.to_string()
}
