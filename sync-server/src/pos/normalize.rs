//! Field normalization helpers shared by adapters
//!
//! Provider schemas disagree on field names, types and hierarchies; these
//! helpers flatten the common quirks so adapters only deal with shapes, not
//! coercion. All functions are pure and idempotent.

use rust_decimal::Decimal;
use serde_json::Value;

use shared::models::menu_item::UNKNOWN_BRAND;

/// Quantity field names seen across providers, in precedence order
pub const QUANTITY_ALIASES: &[&str] = &["quantity", "qty", "quantity_ordered", "count", "units"];

/// Strip a path-style category ("Category > Flower > Indica") to its leaf
pub fn normalize_category(raw: &str) -> String {
    raw.rsplit('>')
        .next()
        .map(str::trim)
        .filter(|leaf| !leaf.is_empty())
        .unwrap_or("Uncategorized")
        .to_string()
}

/// Brand, defaulting to the sentinel when the source omits it
pub fn normalize_brand(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(brand) if !brand.is_empty() => brand.to_string(),
        _ => UNKNOWN_BRAND.to_string(),
    }
}

/// Placeholder image for items the source ships without one
pub fn placeholder_image(category: &str) -> String {
    let slug = match category.to_ascii_lowercase().as_str() {
        "flower" | "pre-rolls" | "prerolls" => "flower",
        "edibles" | "edible" => "edibles",
        "concentrates" | "concentrate" | "extracts" => "concentrates",
        "vapes" | "cartridges" => "vapes",
        "topicals" | "tinctures" => "wellness",
        _ => "default",
    };
    format!("https://static.pos-sync.dev/placeholders/{slug}.png")
}

/// First present numeric value among the known quantity aliases, default 1.
///
/// Some providers send quantities as strings; those are parsed too.
pub fn extract_quantity(raw: &Value) -> i64 {
    for alias in QUANTITY_ALIASES {
        match raw.get(alias) {
            Some(Value::Number(n)) => {
                if let Some(q) = n.as_i64() {
                    return q;
                }
                if let Some(q) = n.as_f64() {
                    return q.round() as i64;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(q) = s.trim().parse::<i64>() {
                    return q;
                }
            }
            _ => {}
        }
    }
    1
}

/// First present field convertible to a Decimal among `keys`, default zero
pub fn extract_decimal(raw: &Value, keys: &[&str]) -> Decimal {
    for key in keys {
        match raw.get(key) {
            Some(Value::Number(n)) => {
                if let Ok(d) = n.to_string().parse::<Decimal>() {
                    return d;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(d) = s.trim().parse::<Decimal>() {
                    return d;
                }
            }
            _ => {}
        }
    }
    Decimal::ZERO
}

/// First present id-ish field among `keys`, stringified.
///
/// Providers flip between numeric and string ids between API versions.
pub fn extract_id(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match raw.get(key) {
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            _ => {}
        }
    }
    None
}

/// First present timestamp among `keys`, as Unix millis.
///
/// Accepts Unix millis, Unix seconds (heuristic: pre-2001 values in millis
/// are treated as seconds), and RFC 3339 strings.
pub fn extract_timestamp(raw: &Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        match raw.get(key) {
            Some(Value::Number(n)) => {
                if let Some(ts) = n.as_i64() {
                    return Some(if ts < 1_000_000_000_000 { ts * 1000 } else { ts });
                }
            }
            Some(Value::String(s)) => {
                if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                    return Some(dt.timestamp_millis());
                }
            }
            _ => {}
        }
    }
    None
}

/// Nullable percentage field (potency values)
pub fn extract_percent(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64)
}
