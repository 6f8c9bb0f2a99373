//! Sales analytics engine
//!
//! All writes for one order land in a single atomic batch. Concurrent
//! recordings for the same product may lose an increment; the periodic
//! rollup corrects the drift, which is the accepted trade against
//! cross-order locking.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use shared::models::analytics::{BundleRedemptionState, ProductSalesState, in_trailing_window};
use shared::models::Order;
use shared::util::{DAY_MS, now_millis};

use crate::store::{DocumentStore, Filter, Query, WriteOp, org_collection};
use crate::utils::AppResult;

/// Max writes per committed batch during rollup/backfill
const BATCH_LIMIT: usize = 500;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollupSummary {
    pub products_scanned: usize,
    pub products_updated: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillSummary {
    pub orders_scanned: usize,
    pub products_seeded: usize,
}

pub struct AnalyticsEngine {
    store: Arc<dyn DocumentStore>,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record one sale-eligible order against the rolling product counters.
    ///
    /// Line items whose product document does not exist are skipped with
    /// zero writes and no error. Bundle references increment the bundle's
    /// redemption state. Everything staged for this order commits atomically.
    pub async fn record_product_sale(&self, org_id: &str, order: &Order) -> AppResult<()> {
        if !order.status.is_sale_eligible() {
            debug!(order = %order.order_id, status = ?order.status, "order not sale-eligible, ignoring");
            return Ok(());
        }

        let products = org_collection(org_id, "products");
        let now = now_millis();
        let mut batch = Vec::new();

        for item in &order.items {
            let Some(doc) = self.store.get(&products, &item.product_id).await? else {
                debug!(
                    product = %item.product_id,
                    order = %order.order_id,
                    "product unknown locally, skipping sale record"
                );
                continue;
            };

            let mut sales = sales_state_of(&doc)?;
            sales.apply_sale(item.quantity, order.purchased_at, now);
            batch.push(WriteOp::Merge {
                collection: products.clone(),
                id: item.product_id.clone(),
                data: json!({ "sales": sales }),
            });
        }

        if !order.bundle_ids.is_empty() {
            let bundles = org_collection(org_id, "bundles");
            for bundle_id in &order.bundle_ids {
                let mut state = match self.store.get(&bundles, bundle_id).await? {
                    Some(doc) => serde_json::from_value::<BundleRedemptionState>(doc)?,
                    None => BundleRedemptionState::default(),
                };
                state.record(&order.order_id, order.purchased_at);
                batch.push(WriteOp::Set {
                    collection: bundles.clone(),
                    id: bundle_id.clone(),
                    data: serde_json::to_value(&state)?,
                });
            }
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.store.commit(batch).await
    }

    /// Periodic correction pass over every product's rolling state.
    ///
    /// Recomputes `trending` from first principles: a product whose most
    /// recent sale fell out of the trailing window gets its window counter
    /// zeroed and its flag cleared. Products with no sales history at all
    /// are skipped entirely.
    pub async fn run_rollup(&self, org_id: &str) -> AppResult<RollupSummary> {
        let products = org_collection(org_id, "products");
        let docs = self.store.query(Query::collection(products.clone())).await?;
        let now = now_millis();

        let mut summary = RollupSummary::default();
        let mut batch = Vec::new();

        for doc in docs {
            summary.products_scanned += 1;

            let mut sales = match doc.data.get("sales") {
                Some(value) if !value.is_null() => {
                    match serde_json::from_value::<ProductSalesState>(value.clone()) {
                        Ok(sales) => sales,
                        Err(e) => {
                            warn!(product = %doc.id, error = %e, "unreadable sales state, skipping");
                            continue;
                        }
                    }
                }
                _ => continue,
            };
            if !sales.has_history() {
                continue;
            }

            if sales.rollup(now) {
                summary.products_updated += 1;
                batch.push(WriteOp::Merge {
                    collection: products.clone(),
                    id: doc.id,
                    data: json!({ "sales": sales }),
                });
                if batch.len() >= BATCH_LIMIT {
                    self.store.commit(std::mem::take(&mut batch)).await?;
                }
            }
        }

        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }

        info!(
            org = org_id,
            scanned = summary.products_scanned,
            updated = summary.products_updated,
            "analytics rollup complete"
        );
        Ok(summary)
    }

    /// One-time seeding of baseline counters from order history.
    ///
    /// Aggregates sale-eligible order quantities per product over the
    /// lookback window and writes the totals as each existing product's
    /// baseline `sales_count`. Never used in steady state.
    pub async fn backfill(&self, org_id: &str, lookback_days: i64) -> AppResult<BackfillSummary> {
        let now = now_millis();
        let cutoff = now - lookback_days * DAY_MS;

        let orders = self
            .store
            .query(
                Query::collection(org_collection(org_id, "orders"))
                    .filter(Filter::Ge("purchased_at".into(), json!(cutoff))),
            )
            .await?;

        struct Aggregate {
            quantity: i64,
            window_quantity: i64,
            last_sale_at: i64,
        }
        let mut totals: HashMap<String, Aggregate> = HashMap::new();
        let mut summary = BackfillSummary::default();

        for doc in orders {
            let order: Order = match serde_json::from_value(doc.data) {
                Ok(order) => order,
                Err(e) => {
                    warn!(order = %doc.id, error = %e, "unreadable order during backfill, skipping");
                    continue;
                }
            };
            if !order.status.is_sale_eligible() {
                continue;
            }
            summary.orders_scanned += 1;

            for item in &order.items {
                let agg = totals.entry(item.product_id.clone()).or_insert(Aggregate {
                    quantity: 0,
                    window_quantity: 0,
                    last_sale_at: order.purchased_at,
                });
                agg.quantity += item.quantity;
                agg.last_sale_at = agg.last_sale_at.max(order.purchased_at);
                if in_trailing_window(order.purchased_at, now) {
                    agg.window_quantity += item.quantity;
                }
            }
        }

        let products = org_collection(org_id, "products");
        let mut batch = Vec::new();

        for (product_id, agg) in totals {
            if self.store.get(&products, &product_id).await?.is_none() {
                debug!(product = %product_id, "product unknown locally, skipping backfill seed");
                continue;
            }

            let mut sales = ProductSalesState {
                sales_count: agg.quantity,
                sales_last_7_days: agg.window_quantity,
                last_sale_at: Some(agg.last_sale_at),
                ..ProductSalesState::default()
            };
            sales.rederive(now);

            summary.products_seeded += 1;
            batch.push(WriteOp::Merge {
                collection: products.clone(),
                id: product_id,
                data: json!({ "sales": sales }),
            });
            if batch.len() >= BATCH_LIMIT {
                self.store.commit(std::mem::take(&mut batch)).await?;
            }
        }

        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }

        info!(
            org = org_id,
            orders = summary.orders_scanned,
            products = summary.products_seeded,
            lookback_days,
            "historical sales backfill complete"
        );
        Ok(summary)
    }
}

/// Rolling state embedded in a product document, default when never sold
fn sales_state_of(doc: &Value) -> AppResult<ProductSalesState> {
    match doc.get("sales") {
        Some(value) if !value.is_null() => Ok(serde_json::from_value(value.clone())?),
        _ => Ok(ProductSalesState::default()),
    }
}
