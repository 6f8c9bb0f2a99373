//! POS provider identifiers

use serde::{Deserialize, Serialize};

/// Supported external POS platforms.
///
/// One adapter implementation exists per variant; new providers are added
/// by implementing `PosAdapter`, never by branching in shared code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosProvider {
    Alleaves,
}

impl PosProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosProvider::Alleaves => "alleaves",
        }
    }

    /// Prefix applied to native order ids to keep them globally unique
    /// across sources (e.g. `alleaves_1042`).
    pub fn order_id(&self, native_id: &str) -> String {
        format!("{}_{}", self.as_str(), native_id)
    }

    /// Sentinel customer id used when a native order carries no customer
    /// identifier. The sale is still recorded, attributed to this id.
    pub fn guest_customer_id(&self) -> String {
        format!("{}_guest", self.as_str())
    }

    /// Domain of synthetic emails this provider issues for privacy.
    ///
    /// Addresses under this domain identify a customer only within the same
    /// provider and must never participate in cross-source email matching.
    pub fn placeholder_email_domain(&self) -> &'static str {
        match self {
            PosProvider::Alleaves => "customers.alleaves.com",
        }
    }
}

impl std::fmt::Display for PosProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PosProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alleaves" => Ok(PosProvider::Alleaves),
            other => Err(format!("unknown POS provider: {other}")),
        }
    }
}
