use shared::models::PosProvider;

/// Server configuration - everything the sync service needs for one location
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ORG_ID | demo-org | Organization the location belongs to |
/// | SYNC_INTERVAL_SECS | 900 | Seconds between sync cycles |
/// | ROLLUP_INTERVAL_SECS | 3600 | Seconds between analytics rollups |
/// | LOG_LEVEL | info | tracing level |
/// | LOG_DIR | (unset) | Optional directory for daily rolling logs |
/// | POS_PROVIDER | alleaves | POS platform identifier |
/// | POS_ENVIRONMENT | sandbox | sandbox \| production |
/// | POS_USERNAME | (empty) | POS API username |
/// | POS_PASSWORD | (empty) | POS API password |
/// | POS_PIN | (unset) | Optional POS pin |
/// | POS_STORE_ID | (empty) | Store identifier at the provider |
/// | POS_LOCATION_ID | (unset) | Location id; defaults to the store id |
/// | POS_PARTNER_ID | (unset) | Optional partner/tenant identifier |
/// | POS_BASE_URL | (unset) | Override of the provider base URL |
///
/// # Example
///
/// ```ignore
/// ORG_ID=acme POS_USERNAME=api@acme.com POS_STORE_ID=17 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub org_id: String,
    pub sync_interval_secs: u64,
    pub rollup_interval_secs: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub location: PosLocationConfig,
}

/// Upstream environment a POS adapter points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosEnvironment {
    Sandbox,
    Production,
}

impl PosEnvironment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => PosEnvironment::Production,
            _ => PosEnvironment::Sandbox,
        }
    }
}

/// Per-location POS integration record
#[derive(Debug, Clone)]
pub struct PosLocationConfig {
    pub provider: PosProvider,
    pub environment: PosEnvironment,
    pub username: String,
    pub password: String,
    pub pin: Option<String>,
    pub store_id: String,
    /// Explicit location id at the provider; absent means "use the store id"
    pub location_id: Option<String>,
    /// Partner/tenant identifier, attached as a header only when present
    pub partner_id: Option<String>,
    /// Base URL override (tests, private deployments)
    pub base_url: Option<String>,
}

impl PosLocationConfig {
    /// The provider-side location id, defaulting to the store id
    pub fn effective_location_id(&self) -> &str {
        self.location_id.as_deref().unwrap_or(&self.store_id)
    }
}

impl Config {
    /// Load configuration from environment variables, with defaults
    pub fn from_env() -> Self {
        Self {
            org_id: std::env::var("ORG_ID").unwrap_or_else(|_| "demo-org".into()),
            sync_interval_secs: std::env::var("SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900),
            rollup_interval_secs: std::env::var("ROLLUP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            location: PosLocationConfig {
                provider: std::env::var("POS_PROVIDER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(PosProvider::Alleaves),
                environment: PosEnvironment::parse(
                    &std::env::var("POS_ENVIRONMENT").unwrap_or_else(|_| "sandbox".into()),
                ),
                username: std::env::var("POS_USERNAME").unwrap_or_default(),
                password: std::env::var("POS_PASSWORD").unwrap_or_default(),
                pin: std::env::var("POS_PIN").ok(),
                store_id: std::env::var("POS_STORE_ID").unwrap_or_default(),
                location_id: std::env::var("POS_LOCATION_ID").ok(),
                partner_id: std::env::var("POS_PARTNER_ID").ok(),
                base_url: std::env::var("POS_BASE_URL").ok(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_location() -> PosLocationConfig {
        PosLocationConfig {
            provider: PosProvider::Alleaves,
            environment: PosEnvironment::Sandbox,
            username: "u".into(),
            password: "p".into(),
            pin: None,
            store_id: "store-9".into(),
            location_id: None,
            partner_id: None,
            base_url: None,
        }
    }

    #[test]
    fn test_location_id_defaults_to_store_id() {
        let mut loc = make_location();
        assert_eq!(loc.effective_location_id(), "store-9");

        loc.location_id = Some("loc-3".into());
        assert_eq!(loc.effective_location_id(), "loc-3");
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(PosEnvironment::parse("Production"), PosEnvironment::Production);
        assert_eq!(PosEnvironment::parse("prod"), PosEnvironment::Production);
        assert_eq!(PosEnvironment::parse("sandbox"), PosEnvironment::Sandbox);
        assert_eq!(PosEnvironment::parse("anything"), PosEnvironment::Sandbox);
    }
}
