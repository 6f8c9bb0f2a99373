//! Rolling sales-analytics state
//!
//! Pure counter/derivation logic; persistence and batching live in the
//! sync-server analytics engine.

use serde::{Deserialize, Serialize};

use crate::util::DAY_MS;

/// Length of the trailing sales window, in days
pub const TRAILING_WINDOW_DAYS: i64 = 7;

/// A product is trending when its velocity exceeds this (units/day)
pub const TRENDING_VELOCITY_THRESHOLD: f64 = 2.0;

/// Redemption history entries kept per bundle
pub const MAX_REDEMPTION_HISTORY: usize = 50;

/// Start of the trailing window relative to `now` (Unix millis)
pub fn window_start(now: i64) -> i64 {
    now - TRAILING_WINDOW_DAYS * DAY_MS
}

/// Whether a sale timestamp falls inside the trailing window ending at `now`
pub fn in_trailing_window(sale_at: i64, now: i64) -> bool {
    sale_at >= window_start(now) && sale_at <= now
}

/// Per-product rolling sales counters and derived signals.
///
/// Created implicitly on the first recorded sale, mutated by every
/// subsequent sale and by the periodic rollup, never hard-deleted — it
/// decays as the window counter is corrected during rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSalesState {
    /// Lifetime unit sales
    pub sales_count: i64,
    /// Trailing-window unit sales, maintained incrementally
    pub sales_last_7_days: i64,
    /// Most recent sale (Unix millis)
    pub last_sale_at: Option<i64>,
    /// Derived: `sales_last_7_days / 7`
    pub sales_velocity: f64,
    /// Derived: high velocity AND recently active
    pub trending: bool,
}

impl ProductSalesState {
    /// Apply one sale of `quantity` units purchased at `purchased_at`.
    ///
    /// `now` anchors the trailing window; a backdated purchase outside the
    /// window still counts toward lifetime sales but not the window counter.
    pub fn apply_sale(&mut self, quantity: i64, purchased_at: i64, now: i64) {
        self.sales_count += quantity;
        if in_trailing_window(purchased_at, now) {
            self.sales_last_7_days += quantity;
        }
        self.last_sale_at = Some(match self.last_sale_at {
            Some(prev) => prev.max(purchased_at),
            None => purchased_at,
        });
        self.rederive(now);
    }

    /// Recompute the derived fields from the counters.
    pub fn rederive(&mut self, now: i64) {
        self.sales_velocity = self.sales_last_7_days as f64 / TRAILING_WINDOW_DAYS as f64;
        self.trending = self.sales_velocity > TRENDING_VELOCITY_THRESHOLD
            && self
                .last_sale_at
                .is_some_and(|at| in_trailing_window(at, now));
    }

    /// Rollup correction: a product whose last sale left the window has, by
    /// definition, zero window sales. Returns true when anything changed.
    pub fn rollup(&mut self, now: i64) -> bool {
        let before = self.clone();
        if !self.last_sale_at.is_some_and(|at| in_trailing_window(at, now)) {
            self.sales_last_7_days = 0;
        }
        self.rederive(now);
        *self != before
    }

    /// True once any sale has ever been recorded
    pub fn has_history(&self) -> bool {
        self.last_sale_at.is_some() || self.sales_count > 0
    }
}

/// One bundle redemption event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionEvent {
    pub order_id: String,
    /// Unix millis
    pub redeemed_at: i64,
}

/// Per-bundle redemption counter and bounded event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleRedemptionState {
    pub current_redemptions: i64,
    #[serde(default)]
    pub redemption_history: Vec<RedemptionEvent>,
}

impl BundleRedemptionState {
    /// Record one redemption, dropping the oldest history entries past the cap
    pub fn record(&mut self, order_id: &str, redeemed_at: i64) {
        self.current_redemptions += 1;
        self.redemption_history.push(RedemptionEvent {
            order_id: order_id.to_string(),
            redeemed_at,
        });
        if self.redemption_history.len() > MAX_REDEMPTION_HISTORY {
            let excess = self.redemption_history.len() - MAX_REDEMPTION_HISTORY;
            self.redemption_history.drain(..excess);
        }
    }
}
