//! Sync cycle orchestration
//!
//! One cycle pulls the full menu and the order history of every known POS
//! customer, persists both in atomic batches, then hands orders that became
//! sale-eligible this cycle to the analytics queue and returns without
//! waiting on it. Re-observing an already-recorded order on a later cycle
//! never double-counts its sale.
//!
//! A cycle reports success based on persistence alone; analytics outcomes
//! arrive later on the queue's outcome channel.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shared::models::{FulfillmentStatus, Order};

use crate::pos::PosAdapter;
use crate::store::{DocumentStore, Filter, Query, WriteOp, org_collection};
use crate::sync::queue::{AnalyticsJob, AnalyticsQueue};
use crate::utils::{AppError, AppResult};

/// What one completed cycle did
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub menu_items: usize,
    pub customers_scanned: usize,
    pub orders_fetched: usize,
    /// Orders handed to analytics this cycle (first time seen sale-eligible)
    pub sales_recorded: usize,
    pub duration_ms: u64,
}

pub struct SyncOrchestrator {
    org_id: String,
    adapter: Arc<dyn PosAdapter>,
    store: Arc<dyn DocumentStore>,
    queue: AnalyticsQueue,
}

impl SyncOrchestrator {
    pub fn new(
        org_id: impl Into<String>,
        adapter: Arc<dyn PosAdapter>,
        store: Arc<dyn DocumentStore>,
        queue: AnalyticsQueue,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            adapter,
            store,
            queue,
        }
    }

    /// Run one sync cycle.
    ///
    /// Cancellation is honored at batch boundaries: a cycle checks the token
    /// before each commit and returns [`AppError::Cancelled`] with the store
    /// untouched by the pending batch.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> AppResult<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        report.menu_items = self.sync_menu(cancel).await?;
        let newly_eligible = self.sync_orders(cancel, &mut report).await?;
        report.sales_recorded = self.enqueue_sales(newly_eligible);
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            org = %self.org_id,
            menu_items = report.menu_items,
            customers = report.customers_scanned,
            orders = report.orders_fetched,
            sales_recorded = report.sales_recorded,
            duration_ms = report.duration_ms,
            "sync cycle complete"
        );
        Ok(report)
    }

    /// Pull the full menu and merge it over the product documents.
    ///
    /// Merge (not Set) so fields other layers own, like rolling `sales`
    /// state, survive every re-upsert.
    async fn sync_menu(&self, cancel: &CancellationToken) -> AppResult<usize> {
        let menu = self.adapter.fetch_menu().await?;
        let collection = org_collection(&self.org_id, "products");

        let batch = menu
            .iter()
            .map(|item| {
                Ok(WriteOp::Merge {
                    collection: collection.clone(),
                    id: item.external_id.clone(),
                    data: serde_json::to_value(item)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        ensure_active(cancel)?;
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(menu.len())
    }

    /// Pull order history for every locally-known customer of this provider
    /// and persist it. A failing customer is logged and skipped; the rest of
    /// the cycle continues.
    ///
    /// Returns the orders that became sale-eligible THIS cycle. History is
    /// re-fetched in full every cycle, so the stored copy of each order acts
    /// as the idempotence guard: an order whose stored status was already
    /// sale-eligible has been handed to analytics by an earlier cycle and is
    /// never enqueued again.
    async fn sync_orders(
        &self,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> AppResult<Vec<Order>> {
        let provider = self.adapter.provider();
        let customers = self
            .store
            .query(
                Query::collection(org_collection(&self.org_id, "customers"))
                    .filter(Filter::Eq("provider".into(), json!(provider.as_str()))),
            )
            .await?;

        let mut orders: Vec<Order> = Vec::new();
        for doc in &customers {
            let Some(external_id) = doc.data.get("external_id").and_then(Value::as_str) else {
                continue;
            };
            report.customers_scanned += 1;
            match self.adapter.get_customer_orders(external_id).await {
                Ok(history) => orders.extend(history),
                Err(e) => {
                    warn!(
                        customer = %doc.id,
                        error = %e,
                        "order history fetch failed, skipping customer"
                    );
                }
            }
        }
        report.orders_fetched = orders.len();

        let collection = org_collection(&self.org_id, "orders");
        let mut batch = Vec::with_capacity(orders.len());
        let mut newly_eligible = Vec::new();
        for order in orders {
            if order.status.is_sale_eligible()
                && !self.sale_already_recorded(&collection, &order.order_id).await?
            {
                newly_eligible.push(order.clone());
            }
            batch.push(WriteOp::Set {
                collection: collection.clone(),
                id: order.order_id.clone(),
                data: serde_json::to_value(&order)?,
            });
        }

        ensure_active(cancel)?;
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(newly_eligible)
    }

    /// Whether the stored copy of this order was already sale-eligible.
    ///
    /// Checked before the fetched copy overwrites it, so each sale is
    /// recorded exactly once: on the cycle where the order is first seen in
    /// a sale-eligible status.
    async fn sale_already_recorded(&self, collection: &str, order_id: &str) -> AppResult<bool> {
        let Some(stored) = self.store.get(collection, order_id).await? else {
            return Ok(false);
        };
        let status = stored
            .get("status")
            .cloned()
            .map(serde_json::from_value::<FulfillmentStatus>);
        Ok(matches!(status, Some(Ok(s)) if s.is_sale_eligible()))
    }

    /// Fire-and-forget handoff of newly sale-eligible orders to analytics
    fn enqueue_sales(&self, orders: Vec<Order>) -> usize {
        let recorded = orders.len();
        for order in orders {
            let accepted = self.queue.enqueue(AnalyticsJob {
                org_id: self.org_id.clone(),
                order,
            });
            if !accepted {
                warn!("analytics queue is closed, dropping sale record");
            }
        }
        recorded
    }
}

fn ensure_active(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}
