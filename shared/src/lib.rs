//! Shared types for the POS sync platform
//!
//! Canonical model value types produced by every POS adapter and consumed
//! by the sync orchestrator and the analytics engine, plus the customer
//! identity rules and small time utilities.

pub mod identity;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Model re-exports (for convenient access)
pub use models::{
    BundleRedemptionState, Customer, FulfillmentStatus, MenuItem, Order, OrderLineItem,
    PosProvider, ProductSalesState, RedemptionEvent,
};
