use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sync_server::{
    AnalyticsEngine, AnalyticsQueue, Config, DocumentStore, MemoryStore, SyncOrchestrator,
    SyncWorker, create_adapter, init_logger_with_file,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment (dotenv, logging)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!(org = %config.org_id, provider = %config.location.provider, "POS sync server starting");

    // 2. Wire the adapter, store and analytics pipeline
    let adapter = create_adapter(&config.location)?;

    if !adapter.validate_connection().await? {
        tracing::warn!("POS connection check failed, continuing anyway (will retry each cycle)");
    }

    // In-memory binding; a persistent store implements the same port
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

    let engine = Arc::new(AnalyticsEngine::new(store.clone()));
    let (queue, queue_handle) = AnalyticsQueue::spawn(engine.clone());

    let orchestrator = Arc::new(SyncOrchestrator::new(
        config.org_id.clone(),
        adapter,
        store,
        queue,
    ));

    // 3. Run the background worker until Ctrl-C
    let shutdown = CancellationToken::new();
    let worker = SyncWorker::new(
        config.org_id.clone(),
        orchestrator,
        engine,
        Duration::from_secs(config.sync_interval_secs),
        Duration::from_secs(config.rollup_interval_secs),
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();

    worker_handle.await?;
    queue_handle.await?;

    tracing::info!("POS sync server stopped");
    Ok(())
}
