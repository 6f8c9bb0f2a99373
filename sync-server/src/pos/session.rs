//! Per-adapter-instance credential session
//!
//! Each adapter instance owns one session; nothing credential-shaped is
//! process-global, so two locations can never bleed tokens into each other.
//!
//! State machine: Unauthenticated → Authenticated → (near-expiry |
//! rejected) → Unauthenticated. The async mutex around the cached token is
//! held across the exchange, so concurrent callers hitting expiry collapse
//! into a single token exchange.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::HeaderMap;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::utils::{AppError, AppResult};

/// Refresh when the token is this close to its expiry
pub const EXPIRY_MARGIN_SECS: i64 = 60;
/// Assumed lifetime when the token carries no decodable `exp` claim
const DEFAULT_TTL_SECS: i64 = 3600;

/// Credentials exchanged for a bearer token
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub pin: Option<String>,
}

struct CachedToken {
    bearer: String,
    expires_at_secs: i64,
}

impl CachedToken {
    fn is_fresh(&self, now_secs: i64) -> bool {
        self.expires_at_secs - now_secs > EXPIRY_MARGIN_SECS
    }
}

/// Bearer-token cache for one adapter instance
pub struct PosSession {
    http: Client,
    login_url: String,
    extra_headers: HeaderMap,
    credentials: Credentials,
    token: Mutex<Option<CachedToken>>,
}

impl PosSession {
    pub fn new(
        http: Client,
        login_url: String,
        extra_headers: HeaderMap,
        credentials: Credentials,
    ) -> Self {
        Self {
            http,
            login_url,
            extra_headers,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// The current bearer token, re-authenticating transparently when the
    /// cache is empty, rejected, or near expiry.
    pub async fn bearer(&self) -> AppResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh(now_secs()) {
                return Ok(cached.bearer.clone());
            }
            debug!("cached POS token near expiry, re-authenticating");
        }

        let fresh = self.exchange().await?;
        let bearer = fresh.bearer.clone();
        *guard = Some(fresh);
        Ok(bearer)
    }

    /// Drop the cached token (called after an upstream auth rejection)
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    async fn exchange(&self) -> AppResult<CachedToken> {
        let mut body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        if let Some(pin) = &self.credentials.pin {
            body["pin"] = json!(pin);
        }

        let response = self
            .http
            .post(&self.login_url)
            .headers(self.extra_headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::auth(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::auth(format!(
                "login rejected: HTTP {status}: {body}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::auth(format!("unparseable login response: {e}")))?;
        let bearer = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::auth("login response carries no token"))?
            .to_string();

        let expires_at_secs = match decode_token_expiry(&bearer) {
            Some(exp) => exp,
            None => {
                warn!("POS token has no decodable exp claim, assuming {DEFAULT_TTL_SECS}s TTL");
                now_secs() + DEFAULT_TTL_SECS
            }
        };

        debug!(expires_at_secs, "exchanged POS credentials for bearer token");
        Ok(CachedToken {
            bearer,
            expires_at_secs,
        })
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Decode the `exp` claim (Unix seconds) from a JWT payload segment.
///
/// No signature validation: the upstream is trusted at the transport layer
/// and we only need the expiry for cache bookkeeping.
pub fn decode_token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}
