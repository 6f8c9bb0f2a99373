//! Customer identity matching rules
//!
//! Two customer records describe the same real person iff either:
//! - they share a normalized **real** email address, or
//! - both carry the same provider and the same provider-issued user id.
//!
//! Providers synthesize placeholder emails for privacy (a fixed domain per
//! provider). Those addresses are only meaningful within that provider and
//! must never be used for cross-source email matching — treating them as
//! real emails is the classic double-counting bug this module exists to
//! prevent. The rule is enforced here, in one place, not re-derived at call
//! sites.

use crate::models::{Customer, PosProvider};

/// Lower-cased, trimmed form used for all email comparisons
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Whether `email` is a synthetic placeholder issued by `provider`
pub fn is_placeholder_email(email: &str, provider: PosProvider) -> bool {
    let normalized = normalize_email(email);
    match normalized.rsplit_once('@') {
        Some((_, domain)) => domain == provider.placeholder_email_domain(),
        None => false,
    }
}

/// Whether `email` is a placeholder of ANY known provider.
///
/// Used when the record itself carries no provider attribution (e.g. a web
/// order) but the address pattern still marks it as synthetic.
pub fn is_any_placeholder_email(email: &str) -> bool {
    is_placeholder_email(email, PosProvider::Alleaves)
}

/// A key under which a customer record can be matched to another record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Normalized real email — valid across sources
    Email(String),
    /// Provider-issued user id — valid only within that provider
    ProviderUser { provider: PosProvider, user_id: String },
}

/// All identity keys a customer record participates in.
///
/// Placeholder emails yield no `Email` key; such records can only match
/// through their provider-issued id.
pub fn identity_keys(customer: &Customer) -> Vec<IdentityKey> {
    let mut keys = Vec::with_capacity(2);

    if let Some(email) = customer.email.as_deref() {
        let normalized = normalize_email(email);
        if !normalized.is_empty() && !is_any_placeholder_email(&normalized) {
            keys.push(IdentityKey::Email(normalized));
        }
    }

    if let (Some(provider), Some(user_id)) = (customer.provider, customer.external_id.as_deref()) {
        if !user_id.is_empty() {
            keys.push(IdentityKey::ProviderUser {
                provider,
                user_id: user_id.to_string(),
            });
        }
    }

    keys
}
