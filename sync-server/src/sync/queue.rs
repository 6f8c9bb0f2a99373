//! Analytics job queue
//!
//! Explicit task/queue handoff between the sync cycle and the analytics
//! engine: the cycle enqueues and returns, the worker task records sales at
//! its own pace and may outlive any cycle. Failures are isolated per order
//! (bulkhead) — one bad record is logged, published on the outcome channel,
//! and never starves the rest of the batch.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use shared::models::Order;

use crate::analytics::AnalyticsEngine;

const OUTCOME_CHANNEL_CAPACITY: usize = 256;

/// One sale-recording job
#[derive(Debug, Clone)]
pub struct AnalyticsJob {
    pub org_id: String,
    pub order: Order,
}

/// Result of one processed job, observable by subscribers
#[derive(Debug, Clone)]
pub struct AnalyticsOutcome {
    pub order_id: String,
    pub error: Option<String>,
}

impl AnalyticsOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Sender side of the queue; cheap to clone
#[derive(Clone)]
pub struct AnalyticsQueue {
    tx: mpsc::UnboundedSender<AnalyticsJob>,
    outcomes: broadcast::Sender<AnalyticsOutcome>,
}

impl AnalyticsQueue {
    /// Spawn the worker task that owns the engine and drains the queue.
    ///
    /// The worker stops once every queue handle is dropped AND the channel
    /// is drained, so enqueued work survives the enqueuing cycle.
    pub fn spawn(engine: Arc<AnalyticsEngine>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AnalyticsJob>();
        let (outcome_tx, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        let outcomes = outcome_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let order_id = job.order.order_id.clone();
                let outcome = match engine.record_product_sale(&job.org_id, &job.order).await {
                    Ok(()) => AnalyticsOutcome {
                        order_id,
                        error: None,
                    },
                    Err(e) => {
                        error!(
                            order = %job.order.order_id,
                            error = %e,
                            "failed to record product sale"
                        );
                        AnalyticsOutcome {
                            order_id,
                            error: Some(e.to_string()),
                        }
                    }
                };
                // No subscribers is fine; outcomes are best-effort telemetry
                let _ = outcome_tx.send(outcome);
            }
            info!("analytics queue drained, worker stopping");
        });

        (Self { tx, outcomes }, handle)
    }

    /// Hand a job to the worker; returns false when the worker is gone
    pub fn enqueue(&self, job: AnalyticsJob) -> bool {
        self.tx.send(job).is_ok()
    }

    /// Observe per-order outcomes (used by tests and health reporting)
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyticsOutcome> {
        self.outcomes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore, org_collection};
    use rust_decimal::Decimal;
    use serde_json::json;
    use shared::models::{FulfillmentStatus, OrderLineItem};
    use shared::util::now_millis;

    const ORG: &str = "org-test";

    fn make_order(id: &str, product_id: &str, quantity: i64) -> Order {
        Order {
            order_id: id.to_string(),
            customer_id: "alleaves_1".to_string(),
            items: vec![OrderLineItem {
                product_id: product_id.to_string(),
                quantity,
                unit_price: Decimal::new(500, 2),
            }],
            total_amount: Decimal::new(500, 2),
            purchased_at: now_millis(),
            bundle_ids: vec![],
            status: FulfillmentStatus::Completed,
        }
    }

    #[tokio::test]
    async fn test_one_failing_job_never_blocks_the_rest() {
        let store = Arc::new(MemoryStore::new());
        let products = org_collection(ORG, "products");
        store.set(&products, "p1", json!({"name": "A"})).await.unwrap();
        // Corrupt sales state makes recording for p2 fail
        store
            .set(&products, "p2", json!({"name": "B", "sales": "corrupt"}))
            .await
            .unwrap();
        store.set(&products, "p3", json!({"name": "C"})).await.unwrap();

        let engine = Arc::new(AnalyticsEngine::new(store.clone() as Arc<dyn DocumentStore>));
        let (queue, handle) = AnalyticsQueue::spawn(engine);
        let mut outcomes = queue.subscribe();

        for (order_id, product) in [("o1", "p1"), ("o2", "p2"), ("o3", "p3")] {
            assert!(queue.enqueue(AnalyticsJob {
                org_id: ORG.to_string(),
                order: make_order(order_id, product, 2),
            }));
        }
        drop(queue); // close the channel so the worker drains and exits
        handle.await.unwrap();

        let mut failed = Vec::new();
        let mut succeeded = Vec::new();
        for _ in 0..3 {
            let outcome = outcomes.recv().await.unwrap();
            if outcome.is_ok() {
                succeeded.push(outcome.order_id);
            } else {
                failed.push(outcome.order_id);
            }
        }
        assert_eq!(failed, vec!["o2"]);
        assert_eq!(succeeded, vec!["o1", "o3"]);

        // The orders around the failure were still recorded
        for product in ["p1", "p3"] {
            let doc = store.get(&products, product).await.unwrap().unwrap();
            assert_eq!(doc["sales"]["sales_count"], 2);
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_gone_reports_false() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(AnalyticsEngine::new(store as Arc<dyn DocumentStore>));
        let (queue, handle) = AnalyticsQueue::spawn(engine);

        let probe = queue.clone();
        drop(queue);
        handle.abort();
        let _ = handle.await;

        // The receiver is gone; enqueue must signal it instead of panicking
        assert!(!probe.enqueue(AnalyticsJob {
            org_id: ORG.to_string(),
            order: make_order("o1", "p1", 1),
        }));
    }
}
