//! POS adapter abstraction
//!
//! One adapter per external platform, all implementing the same capability
//! set. The orchestrator and analytics only ever see this trait and the
//! canonical model — adding a provider means implementing [`PosAdapter`],
//! never branching in shared code.

pub mod alleaves;
pub mod normalize;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use shared::models::{Customer, MenuItem, Order, PosProvider};

use crate::core::PosLocationConfig;
use crate::utils::AppResult;

pub use alleaves::AlleavesAdapter;
pub use session::{Credentials, PosSession};

/// Input for creating (or finding) a customer at the provider
#[derive(Debug, Clone)]
pub struct CustomerInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Input for placing an order at the provider
#[derive(Debug, Clone)]
pub struct OrderInput {
    /// Provider-issued customer id; absent means a guest order
    pub customer_external_id: Option<String>,
    pub items: Vec<shared::models::OrderLineItem>,
    pub bundle_ids: Vec<String>,
}

/// The fixed capability set every POS integration provides.
///
/// Errors follow the taxonomy in [`crate::utils::error`]: non-2xx responses
/// surface as `Upstream` with the body captured verbatim; lookups that find
/// nothing return `Ok(None)`.
#[async_trait]
pub trait PosAdapter: Send + Sync {
    fn provider(&self) -> PosProvider;

    /// Cheap reachability/credentials probe
    async fn validate_connection(&self) -> AppResult<bool>;

    /// Full menu, normalized to the canonical model
    async fn fetch_menu(&self) -> AppResult<Vec<MenuItem>>;

    /// Available-to-sell quantities for the requested ids.
    ///
    /// Two-tier: bulk endpoint first, full-menu fallback on any bulk
    /// failure. A successful fallback never surfaces an error.
    async fn get_inventory(&self, product_ids: &[String]) -> AppResult<HashMap<String, i64>>;

    async fn find_customer_by_email(&self, email: &str) -> AppResult<Option<Customer>>;

    async fn create_customer(&self, input: &CustomerInput) -> AppResult<Customer>;

    /// Find-or-create: looks up by email first and only creates on a miss,
    /// so repeated calls with the same email never duplicate.
    async fn sync_customer(&self, input: &CustomerInput) -> AppResult<Customer>;

    async fn create_order(&self, input: &OrderInput) -> AppResult<Order>;

    /// Order history for one provider-issued customer id
    async fn get_customer_orders(&self, customer_external_id: &str) -> AppResult<Vec<Order>>;
}

/// Build the adapter for a location's configured provider
pub fn create_adapter(config: &PosLocationConfig) -> AppResult<Arc<dyn PosAdapter>> {
    match config.provider {
        PosProvider::Alleaves => Ok(Arc::new(AlleavesAdapter::new(config)?)),
    }
}
