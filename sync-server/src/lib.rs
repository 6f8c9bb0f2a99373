//! POS Sync Server - menu, order and customer synchronization for retail POS platforms
//!
//! # Module structure
//!
//! ```text
//! sync-server/src/
//! ├── core/          # configuration
//! ├── pos/           # adapter trait, session cache, provider adapters
//! ├── store/         # document-store port + in-memory binding
//! ├── sync/          # cycle orchestration, analytics queue, dedup, worker
//! ├── analytics/     # rolling sales counters, rollup, backfill
//! └── utils/         # errors, logging
//! ```

pub mod analytics;
pub mod core;
pub mod pos;
pub mod store;
pub mod sync;
pub mod utils;

// Re-export public types
pub use analytics::{AnalyticsEngine, BackfillSummary, RollupSummary};
pub use core::{Config, PosEnvironment, PosLocationConfig};
pub use pos::{CustomerInput, OrderInput, PosAdapter, create_adapter};
pub use store::{Document, DocumentStore, MemoryStore, Query, WriteOp};
pub use sync::{AnalyticsQueue, SyncOrchestrator, SyncReport, SyncWorker};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
