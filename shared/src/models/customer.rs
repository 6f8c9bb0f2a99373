//! Customer model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PosProvider;

/// A locally-owned customer record.
///
/// Originates either from a POS platform (carries `provider` +
/// `external_id`) or from a direct web order (neither). Identity matching
/// across the two sources follows [`crate::identity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Local document id
    pub id: String,
    /// Provider-issued user id, when the record came from a POS
    pub external_id: Option<String>,
    pub provider: Option<PosProvider>,
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub order_count: i64,
    #[serde(default)]
    pub total_spent: Decimal,
    /// When this record was first discovered locally (Unix millis)
    pub first_seen_at: i64,
    pub last_order_at: Option<i64>,
}

impl Customer {
    /// Fold `other` into `self`, combining activity counters.
    ///
    /// The receiver keeps its own id (first-seen wins); recency fields take
    /// the most recent value from either side.
    pub fn absorb(&mut self, other: &Customer) {
        self.order_count += other.order_count;
        self.total_spent += other.total_spent;
        self.last_order_at = match (self.last_order_at, other.last_order_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.email.is_none() {
            self.email = other.email.clone();
        }
        if self.external_id.is_none() {
            self.external_id = other.external_id.clone();
            self.provider = self.provider.or(other.provider);
        }
        if self.phone.is_none() {
            self.phone = other.phone.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_customer(id: &str, first_seen_at: i64) -> Customer {
        Customer {
            id: id.to_string(),
            external_id: None,
            provider: None,
            email: None,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            order_count: 0,
            total_spent: Decimal::ZERO,
            first_seen_at,
            last_order_at: None,
        }
    }

    #[test]
    fn test_absorb_combines_counters() {
        let mut a = make_customer("c1", 100);
        a.order_count = 2;
        a.total_spent = Decimal::new(5000, 2); // 50.00
        a.last_order_at = Some(500);

        let mut b = make_customer("c2", 200);
        b.order_count = 3;
        b.total_spent = Decimal::new(2550, 2); // 25.50
        b.last_order_at = Some(900);
        b.email = Some("x@example.com".to_string());

        a.absorb(&b);

        assert_eq!(a.id, "c1");
        assert_eq!(a.order_count, 5);
        assert_eq!(a.total_spent, Decimal::new(7550, 2));
        assert_eq!(a.last_order_at, Some(900));
        assert_eq!(a.email.as_deref(), Some("x@example.com"));
    }

    #[test]
    fn test_absorb_keeps_existing_identity_fields() {
        let mut a = make_customer("c1", 100);
        a.email = Some("keep@example.com".to_string());
        a.external_id = Some("77".to_string());
        a.provider = Some(PosProvider::Alleaves);

        let mut b = make_customer("c2", 200);
        b.email = Some("other@example.com".to_string());
        b.external_id = Some("88".to_string());

        a.absorb(&b);

        assert_eq!(a.email.as_deref(), Some("keep@example.com"));
        assert_eq!(a.external_id.as_deref(), Some("77"));
    }
}
