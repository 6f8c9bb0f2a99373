//! Canonical model types
//!
//! Every POS adapter normalizes its native wire formats into these types;
//! the orchestrator and the analytics engine never see provider JSON.

pub mod analytics;
pub mod customer;
pub mod menu_item;
pub mod order;
pub mod provider;

pub use analytics::{BundleRedemptionState, ProductSalesState, RedemptionEvent};
pub use customer::Customer;
pub use menu_item::MenuItem;
pub use order::{FulfillmentStatus, Order, OrderLineItem};
pub use provider::PosProvider;
