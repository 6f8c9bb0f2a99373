//! Unified error handling
//!
//! One application error enum for every layer of the sync server.
//!
//! # Taxonomy
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `Auth` | credential exchange / token rejection, fatal to the current call |
//! | `Upstream` | non-2xx from a POS endpoint, body captured verbatim |
//! | `Validation` | bad input or unparseable upstream payload |
//! | `Store` | document-store failure |
//! | `Cancelled` | sync cycle aborted by its caller before commit |
//! | `Internal` | everything else |
//!
//! Missing-entity conditions are a normal outcome here (customer lookup
//! miss, sale for an unknown product) and are expressed as `Ok(None)` / a
//! skip, never as an error variant.

use tracing::error;

/// Application error enum
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Authentication ==========
    #[error("Authentication failed: {0}")]
    Auth(String),

    // ========== Upstream POS ==========
    /// Non-2xx from an upstream endpoint. The message keeps a stable
    /// "`{operation} failed`" prefix so callers and alerts can key on it.
    #[error("{operation} failed: HTTP {status}: {body}")]
    Upstream {
        operation: String,
        status: u16,
        body: String,
    },

    // ========== Business / data ==========
    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== Infrastructure ==========
    #[error("Store error: {0}")]
    Store(String),

    #[error("Sync cycle cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap a non-2xx upstream response
    pub fn upstream(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let operation = operation.into();
        let body = body.into();
        error!(target: "pos", operation = %operation, status, "Upstream request failed");
        Self::Upstream {
            operation,
            status,
            body,
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the call once after re-authentication makes sense
    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth(_))
            || matches!(self, AppError::Upstream { status: 401, .. })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Internal(format!("HTTP request failed: {e}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {e}"))
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
