//! Sync orchestration
//!
//! The cycle (menu + order history + analytics handoff), the analytics job
//! queue, customer identity dedup, and the periodic background worker.

pub mod customers;
pub mod orchestrator;
pub mod queue;
pub mod worker;

pub use customers::{MergeSummary, merge_duplicate_customers};
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use queue::{AnalyticsJob, AnalyticsOutcome, AnalyticsQueue};
pub use worker::SyncWorker;
