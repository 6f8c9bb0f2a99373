//! SyncWorker — background worker driving periodic sync and rollup
//!
//! Runs one sync cycle immediately on startup, then ticks on two independent
//! intervals: the sync cycle and the analytics rollup. Cycle failures are
//! logged and the next tick tries again with fresh state; the worker itself
//! only stops on cancellation.

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::analytics::AnalyticsEngine;
use crate::sync::SyncOrchestrator;
use crate::utils::AppError;

/// Retry attempts for one sync cycle before waiting for the next tick
const MAX_RETRIES: u32 = 3;
/// Initial retry delay
const INITIAL_RETRY_DELAY_SECS: u64 = 5;

pub struct SyncWorker {
    org_id: String,
    orchestrator: Arc<SyncOrchestrator>,
    engine: Arc<AnalyticsEngine>,
    sync_interval: Duration,
    rollup_interval: Duration,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        org_id: impl Into<String>,
        orchestrator: Arc<SyncOrchestrator>,
        engine: Arc<AnalyticsEngine>,
        sync_interval: Duration,
        rollup_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            orchestrator,
            engine,
            sync_interval,
            rollup_interval,
            shutdown,
        }
    }

    /// Run the sync worker
    ///
    /// 1. Sync cycle on startup
    /// 2. Periodic sync cycles
    /// 3. Periodic analytics rollups on their own interval
    pub async fn run(self) {
        info!("SyncWorker started");

        self.sync_with_retry().await;

        let mut sync_interval = tokio::time::interval(self.sync_interval);
        sync_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sync_interval.tick().await; // skip immediate tick

        let mut rollup_interval = tokio::time::interval(self.rollup_interval);
        rollup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        rollup_interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("SyncWorker shutting down");
                    break;
                }

                _ = sync_interval.tick() => {
                    self.sync_with_retry().await;
                }

                _ = rollup_interval.tick() => {
                    // run_rollup logs its own summary
                    if let Err(e) = self.engine.run_rollup(&self.org_id).await {
                        error!("Analytics rollup failed: {e}");
                    }
                }
            }
        }

        info!("SyncWorker stopped");
    }

    /// Run one cycle with exponential backoff retry.
    ///
    /// Cancellation aborts immediately; other failures retry up to
    /// [`MAX_RETRIES`] times, then give up until the next tick.
    async fn sync_with_retry(&self) {
        let mut delay = Duration::from_secs(INITIAL_RETRY_DELAY_SECS);

        for attempt in 0..MAX_RETRIES {
            match self.orchestrator.run_cycle(&self.shutdown).await {
                Ok(_) => return,
                Err(AppError::Cancelled) => {
                    info!("Sync cycle cancelled");
                    return;
                }
                Err(e) if attempt + 1 < MAX_RETRIES => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        delay_secs = delay.as_secs(),
                        "Sync cycle failed, retrying: {e}"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = (delay * 2).min(Duration::from_secs(60));
                }
                Err(e) => {
                    error!("Sync cycle failed after retries: {e}");
                    return;
                }
            }
        }
    }
}
