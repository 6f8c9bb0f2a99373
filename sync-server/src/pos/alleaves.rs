//! Alleaves POS adapter
//!
//! Endpoints (all JSON, relative to `{base}/api/v1`):
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/auth/login` | credential exchange → `{"token": <jwt>}` |
//! | GET  | `/location` | location listing (connection probe) |
//! | POST | `/inventory/search` | full inventory/menu for a location |
//! | POST | `/location/{loc}/inventory/items` | quantities for specific item ids |
//! | POST | `/customer/search` | customer lookup by email |
//! | POST | `/customer` | customer creation |
//! | POST | `/order` | order creation |
//! | GET  | `/customer/{id}/orders` | order history for one customer |
//!
//! The partner id header is attached to every request only when the
//! location config carries one; otherwise the header is entirely absent.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use tracing::{debug, warn};

use shared::models::{Customer, FulfillmentStatus, MenuItem, Order, OrderLineItem, PosProvider};
use shared::util::now_millis;

use crate::core::{PosEnvironment, PosLocationConfig};
use crate::utils::{AppError, AppResult};

use super::normalize::{
    extract_decimal, extract_id, extract_percent, extract_quantity, extract_timestamp,
    normalize_brand, normalize_category, placeholder_image,
};
use super::session::{Credentials, PosSession};
use super::{CustomerInput, OrderInput, PosAdapter};

const PRODUCTION_BASE: &str = "https://app.alleaves.com";
const SANDBOX_BASE: &str = "https://app.sandbox.alleaves.com";
const PARTNER_HEADER: &str = "x-alleaves-partner-id";
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct AlleavesAdapter {
    http: Client,
    base_url: String,
    location_id: String,
    extra_headers: HeaderMap,
    session: PosSession,
}

impl AlleavesAdapter {
    pub fn new(config: &PosLocationConfig) -> AppResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| {
                match config.environment {
                    PosEnvironment::Production => PRODUCTION_BASE,
                    PosEnvironment::Sandbox => SANDBOX_BASE,
                }
                .to_string()
            })
            .trim_end_matches('/')
            .to_string();

        let mut extra_headers = HeaderMap::new();
        if let Some(partner_id) = config.partner_id.as_deref().filter(|p| !p.is_empty()) {
            let value = HeaderValue::from_str(partner_id)
                .map_err(|_| AppError::validation("partner id is not a valid header value"))?;
            extra_headers.insert(PARTNER_HEADER, value);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        let session = PosSession::new(
            http.clone(),
            format!("{base_url}/api/v1/auth/login"),
            extra_headers.clone(),
            Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
                pin: config.pin.clone(),
            },
        );

        Ok(Self {
            http,
            base_url,
            location_id: config.effective_location_id().to_string(),
            extra_headers,
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    /// Send an authenticated request. On an auth rejection the cached token
    /// is dropped, re-authentication happens exactly once, and the request
    /// is retried exactly once.
    async fn send<F>(&self, operation: &str, build: F) -> AppResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = self.session.bearer().await?;
        let response = self.authorized(build(&self.http), &token).send().await?;

        match Self::checked(operation, response).await {
            Err(e) if e.is_auth() => {
                warn!(operation, "POS rejected token, re-authenticating once");
                self.session.invalidate().await;
                let token = self.session.bearer().await?;
                let response = self.authorized(build(&self.http), &token).send().await?;
                Self::checked(operation, response).await
            }
            result => result,
        }
    }

    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .headers(self.extra_headers.clone())
            .bearer_auth(token)
    }

    /// Wrap any non-2xx into `AppError::Upstream`, body captured verbatim
    async fn checked(operation: &str, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::upstream(operation, status.as_u16(), body))
    }

    /// Bulk inventory-by-ids endpoint (primary tier of `get_inventory`)
    async fn fetch_inventory_by_ids(
        &self,
        product_ids: &[String],
    ) -> AppResult<HashMap<String, i64>> {
        let url = self.url(&format!("/location/{}/inventory/items", self.location_id));
        let body = json!({ "item_ids": product_ids });
        let response = self
            .send("fetch_inventory_by_ids", move |http| {
                http.post(&url).json(&body)
            })
            .await?;

        let rows: Vec<Value> = parse_array(response.json().await?, "items");
        let mut quantities = HashMap::new();
        for row in &rows {
            if let Some(id) = extract_id(row, &["id_item", "item_id", "id"]) {
                let qty = row
                    .get("quantity_available")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                quantities.insert(id, qty);
            }
        }
        Ok(quantities)
    }

    // ========== Native → canonical mapping ==========

    fn map_menu_item(raw: &Value) -> Option<MenuItem> {
        let external_id = extract_id(raw, &["id_item", "item_id", "id"])?;
        let name = raw
            .get("product_name")
            .or_else(|| raw.get("name"))
            .and_then(Value::as_str)?
            .trim()
            .to_string();
        let category = normalize_category(
            raw.get("category").and_then(Value::as_str).unwrap_or(""),
        );
        let image_url = raw
            .get("image_url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_image(&category));

        Some(MenuItem {
            external_id,
            name,
            brand: normalize_brand(raw.get("brand").and_then(Value::as_str)),
            category,
            price: extract_decimal(raw, &["price_retail", "price"]),
            // Available-to-sell, deliberately not quantity_on_hand
            stock: raw
                .get("quantity_available")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            thc_percent: extract_percent(raw, "percent_thc"),
            cbd_percent: extract_percent(raw, "percent_cbd"),
            image_url,
            raw_data: raw.clone(),
        })
    }

    fn map_customer(provider: PosProvider, raw: &Value) -> Option<Customer> {
        let external_id = extract_id(raw, &["id_customer", "customer_id", "id"])?;
        Some(Customer {
            id: format!("{}_{}", provider.as_str(), external_id),
            external_id: Some(external_id),
            provider: Some(provider),
            email: raw
                .get("email")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            first_name: raw
                .get("name_first")
                .or_else(|| raw.get("first_name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            last_name: raw
                .get("name_last")
                .or_else(|| raw.get("last_name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            phone: raw
                .get("phone")
                .and_then(Value::as_str)
                .map(str::to_string),
            order_count: 0,
            total_spent: rust_decimal::Decimal::ZERO,
            first_seen_at: now_millis(),
            last_order_at: None,
        })
    }

    fn map_order(provider: PosProvider, raw: &Value) -> Option<Order> {
        let native_id = extract_id(raw, &["id_order", "order_id", "id"])?;

        let items = raw
            .get("items")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        let product_id =
                            extract_id(row, &["id_item", "item_id", "product_id"])?;
                        Some(OrderLineItem {
                            product_id,
                            quantity: extract_quantity(row),
                            unit_price: extract_decimal(
                                row,
                                &["unit_price", "price", "price_retail"],
                            ),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        // A missing customer id never drops the sale; it becomes a guest sale.
        let customer_id = extract_id(raw, &["id_customer", "customer_id"])
            .map(|ext| format!("{}_{}", provider.as_str(), ext))
            .unwrap_or_else(|| provider.guest_customer_id());

        let bundle_ids = raw
            .get("bundle_ids")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Order {
            order_id: provider.order_id(&native_id),
            customer_id,
            items,
            total_amount: extract_decimal(raw, &["total", "order_total", "total_amount"]),
            purchased_at: extract_timestamp(raw, &["purchased_at", "date_ordered", "created_at"])
                .unwrap_or_else(now_millis),
            bundle_ids,
            status: raw
                .get("status")
                .and_then(Value::as_str)
                .map(FulfillmentStatus::parse)
                .unwrap_or(FulfillmentStatus::Pending),
        })
    }
}

/// Upstream endpoints flip between a bare array and `{"<key>": [...]}`
fn parse_array(payload: Value, key: &str) -> Vec<Value> {
    match payload {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove(key) {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl PosAdapter for AlleavesAdapter {
    fn provider(&self) -> PosProvider {
        PosProvider::Alleaves
    }

    async fn validate_connection(&self) -> AppResult<bool> {
        let url = self.url("/location");
        match self
            .send("validate_connection", move |http| http.get(&url))
            .await
        {
            Ok(_) => Ok(true),
            Err(AppError::Upstream { status, .. }) => {
                warn!(status, "Alleaves connection validation failed");
                Ok(false)
            }
            Err(AppError::Auth(reason)) => {
                warn!(%reason, "Alleaves credentials rejected during validation");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_menu(&self) -> AppResult<Vec<MenuItem>> {
        let url = self.url("/inventory/search");
        let body = json!({ "id_location": self.location_id });
        let response = self
            .send("fetch_menu", move |http| http.post(&url).json(&body))
            .await?;

        let rows = parse_array(response.json().await?, "items");
        let mut menu = Vec::with_capacity(rows.len());
        for raw in &rows {
            match Self::map_menu_item(raw) {
                Some(item) => menu.push(item),
                // One malformed record never aborts the batch
                None => warn!(record = %raw, "skipping unmappable inventory record"),
            }
        }
        debug!(items = menu.len(), "fetched Alleaves menu");
        Ok(menu)
    }

    async fn get_inventory(&self, product_ids: &[String]) -> AppResult<HashMap<String, i64>> {
        match self.fetch_inventory_by_ids(product_ids).await {
            Ok(quantities) => Ok(quantities),
            Err(e) => {
                // Recoverable by design: derive the quantities from a full
                // menu fetch instead of surfacing the bulk failure.
                warn!(error = %e, "bulk inventory fetch failed, falling back to full menu");
                let menu = self.fetch_menu().await?;
                let wanted: std::collections::HashSet<&str> =
                    product_ids.iter().map(String::as_str).collect();
                Ok(menu
                    .into_iter()
                    .filter(|item| wanted.contains(item.external_id.as_str()))
                    .map(|item| (item.external_id, item.stock))
                    .collect())
            }
        }
    }

    async fn find_customer_by_email(&self, email: &str) -> AppResult<Option<Customer>> {
        let url = self.url("/customer/search");
        let body = json!({
            "email": shared::identity::normalize_email(email),
            "id_location": self.location_id,
        });
        let response = self
            .send("find_customer_by_email", move |http| {
                http.post(&url).json(&body)
            })
            .await?;

        let rows = parse_array(response.json().await?, "customers");
        Ok(rows
            .first()
            .and_then(|raw| Self::map_customer(PosProvider::Alleaves, raw)))
    }

    async fn create_customer(&self, input: &CustomerInput) -> AppResult<Customer> {
        let url = self.url("/customer");
        let body = json!({
            "email": input.email,
            "name_first": input.first_name,
            "name_last": input.last_name,
            "phone": input.phone,
            "id_location": self.location_id,
        });
        let response = self
            .send("create_customer", move |http| http.post(&url).json(&body))
            .await?;

        let raw: Value = response.json().await?;
        Self::map_customer(PosProvider::Alleaves, &raw)
            .ok_or_else(|| AppError::validation("create_customer response carries no customer id"))
    }

    async fn sync_customer(&self, input: &CustomerInput) -> AppResult<Customer> {
        if let Some(existing) = self.find_customer_by_email(&input.email).await? {
            debug!(customer = %existing.id, "sync_customer matched existing customer");
            return Ok(existing);
        }
        self.create_customer(input).await
    }

    async fn create_order(&self, input: &OrderInput) -> AppResult<Order> {
        let url = self.url("/order");
        let items: Vec<Value> = input
            .items
            .iter()
            .map(|item| {
                json!({
                    "id_item": item.product_id,
                    "quantity": item.quantity,
                    "price": item.unit_price,
                })
            })
            .collect();
        let body = json!({
            "id_location": self.location_id,
            "id_customer": input.customer_external_id,
            "items": items,
            "bundle_ids": input.bundle_ids,
        });
        let response = self
            .send("create_order", move |http| http.post(&url).json(&body))
            .await?;

        let raw: Value = response.json().await?;
        Self::map_order(PosProvider::Alleaves, &raw)
            .ok_or_else(|| AppError::validation("create_order response carries no order id"))
    }

    async fn get_customer_orders(&self, customer_external_id: &str) -> AppResult<Vec<Order>> {
        let url = self.url(&format!("/customer/{customer_external_id}/orders"));
        let location = self.location_id.clone();
        let response = self
            .send("get_customer_orders", move |http| {
                http.get(&url).query(&[("id_location", location.as_str())])
            })
            .await?;

        let rows = parse_array(response.json().await?, "orders");
        let mut orders = Vec::with_capacity(rows.len());
        for raw in &rows {
            match Self::map_order(PosProvider::Alleaves, raw) {
                Some(order) => orders.push(order),
                None => warn!(record = %raw, "skipping unmappable order record"),
            }
        }
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_map_menu_item_normalizes_fields() {
        let raw = json!({
            "id_item": 311,
            "product_name": " OG Kush 3.5g ",
            "category": "Category > Flower",
            "price_retail": 25.0,
            "quantity_available": 10,
            "quantity_on_hand": 14,
            "percent_thc": 21.5,
            "percent_cbd": 0.3,
        });
        let item = AlleavesAdapter::map_menu_item(&raw).unwrap();

        assert_eq!(item.external_id, "311");
        assert_eq!(item.name, "OG Kush 3.5g");
        assert_eq!(item.brand, "Unknown");
        assert_eq!(item.category, "Flower");
        assert_eq!(item.price, Decimal::new(250, 1));
        // Available-to-sell, not on-hand
        assert_eq!(item.stock, 10);
        assert_eq!(item.thc_percent, Some(21.5));
        assert_eq!(item.cbd_percent, Some(0.3));
        assert_eq!(item.image_url, placeholder_image("Flower"));
        assert_eq!(item.raw_data, raw);
    }

    #[test]
    fn test_map_menu_item_is_idempotent() {
        let raw = json!({"id_item": 1, "product_name": "Gummies", "category": "Edibles"});
        assert_eq!(
            AlleavesAdapter::map_menu_item(&raw),
            AlleavesAdapter::map_menu_item(&raw)
        );
    }

    #[test]
    fn test_map_menu_item_without_id_is_rejected() {
        assert!(AlleavesAdapter::map_menu_item(&json!({"product_name": "x"})).is_none());
    }

    #[test]
    fn test_map_order_prefixes_id_and_tolerates_qty_aliases() {
        let raw = json!({
            "id_order": 1042,
            "id_customer": 84421,
            "status": "complete",
            "total": 50.0,
            "purchased_at": 1_700_000_000_000_i64,
            "items": [
                {"id_item": 7, "quantity": 2, "price": 20.0},
                {"id_item": 8, "qty": 3, "price": 10.0},
                {"id_item": 9, "price": 5.0},
            ],
        });
        let order = AlleavesAdapter::map_order(PosProvider::Alleaves, &raw).unwrap();

        assert_eq!(order.order_id, "alleaves_1042");
        assert_eq!(order.customer_id, "alleaves_84421");
        assert_eq!(order.status, FulfillmentStatus::Completed);
        assert_eq!(order.purchased_at, 1_700_000_000_000);
        assert_eq!(order.items.len(), 3);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[1].quantity, 3);
        // No quantity alias at all defaults to one unit
        assert_eq!(order.items[2].quantity, 1);
    }

    #[test]
    fn test_map_order_missing_customer_becomes_guest_sale() {
        let raw = json!({
            "id_order": 9,
            "status": "ready",
            "items": [{"id_item": 1, "quantity": 1, "price": 5.0}],
        });
        let order = AlleavesAdapter::map_order(PosProvider::Alleaves, &raw).unwrap();
        assert_eq!(order.customer_id, "alleaves_guest");
        assert!(order.status.is_sale_eligible());
    }

    #[test]
    fn test_map_order_bundle_ids_stringified() {
        let raw = json!({
            "id_order": 9,
            "status": "pending",
            "bundle_ids": ["weekend-special", 42],
        });
        let order = AlleavesAdapter::map_order(PosProvider::Alleaves, &raw).unwrap();
        assert_eq!(order.bundle_ids, vec!["weekend-special", "42"]);
    }

    #[test]
    fn test_parse_array_both_shapes() {
        assert_eq!(parse_array(json!([1, 2]), "items").len(), 2);
        assert_eq!(parse_array(json!({"items": [1]}), "items").len(), 1);
        assert_eq!(parse_array(json!({"other": [1]}), "items").len(), 0);
        assert_eq!(parse_array(json!("nope"), "items").len(), 0);
    }
}
