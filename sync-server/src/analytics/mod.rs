//! Sales analytics
//!
//! Rolling per-product counters, bundle redemption tracking, the periodic
//! rollup and the one-time historical backfill. Counter/derivation math
//! lives in `shared::models::analytics`; this module owns persistence.

pub mod engine;

pub use engine::{AnalyticsEngine, BackfillSummary, RollupSummary};
