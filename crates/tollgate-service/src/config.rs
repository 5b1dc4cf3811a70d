//! Service configuration.
//!
//! All settings come from environment variables with sensible development
//! defaults. Secrets (webhook secret, admin key, upstream key) have no
//! defaults; the features they guard degrade gracefully when unset.

use std::env;

use crate::error::ApiError;

/// Configuration for the tollgate service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind the HTTP listener to.
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory.
    pub data_dir: String,

    /// Shared secret for payment webhook signature verification.
    /// Unset skips verification (development mode).
    pub payment_webhook_secret: Option<String>,

    /// Shared secret for admin endpoints (`x-admin-key`).
    /// Unset disables admin endpoints entirely.
    pub admin_api_key: Option<String>,

    /// Base URL of the upstream model provider. Unset falls back to a
    /// local echo stub.
    pub upstream_url: Option<String>,

    /// API key sent to the upstream provider.
    pub upstream_api_key: Option<String>,

    /// Per-attempt deadline for upstream calls, in seconds.
    pub upstream_timeout_seconds: u64,

    /// URL to notify with invoice receipts after credits are applied.
    /// Unset disables notification.
    pub invoice_webhook_url: Option<String>,

    /// Allowed CORS origins. `*` allows any origin.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Whole-request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Per-IP coarse budget (requests per minute).
    pub ip_per_minute: u64,

    /// Per-IP burst budget (requests per 10 seconds).
    pub ip_burst_per_10s: u64,

    /// Per-identity budget on metered endpoints (requests per minute).
    pub user_per_minute: u64,

    /// Per-identity budget scoped to the generate endpoint
    /// (requests per minute).
    pub generate_per_minute: u64,

    /// Concurrent in-flight metered requests allowed per identity.
    pub max_concurrent_per_identity: u32,

    /// TTL on concurrency slots; bounds how long a crashed holder can
    /// keep a slot, in seconds.
    pub slot_ttl_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
            payment_webhook_secret: None,
            admin_api_key: None,
            upstream_url: None,
            upstream_api_key: None,
            upstream_timeout_seconds: 30,
            invoice_webhook_url: None,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 75,
            ip_per_minute: 30,
            ip_burst_per_10s: 10,
            user_per_minute: 30,
            generate_per_minute: 20,
            max_concurrent_per_identity: 2,
            slot_ttl_seconds: 60,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but unparseable.
    pub fn from_env() -> Result<Self, ApiError> {
        let defaults = Self::default();

        Ok(Self {
            listen_addr: env_or("TOLLGATE_LISTEN_ADDR", defaults.listen_addr),
            data_dir: env_or("TOLLGATE_DATA_DIR", defaults.data_dir),
            payment_webhook_secret: env_opt("TOLLGATE_PAYMENT_WEBHOOK_SECRET"),
            admin_api_key: env_opt("TOLLGATE_ADMIN_API_KEY"),
            upstream_url: env_opt("TOLLGATE_UPSTREAM_URL"),
            upstream_api_key: env_opt("TOLLGATE_UPSTREAM_API_KEY"),
            upstream_timeout_seconds: env_parsed(
                "TOLLGATE_UPSTREAM_TIMEOUT_SECONDS",
                defaults.upstream_timeout_seconds,
            )?,
            invoice_webhook_url: env_opt("TOLLGATE_INVOICE_WEBHOOK_URL"),
            cors_origins: env_opt("TOLLGATE_CORS_ORIGINS").map_or(defaults.cors_origins, |v| {
                v.split(',').map(|s| s.trim().to_string()).collect()
            }),
            max_body_bytes: env_parsed("TOLLGATE_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            request_timeout_seconds: env_parsed(
                "TOLLGATE_REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )?,
            ip_per_minute: env_parsed("TOLLGATE_IP_PER_MINUTE", defaults.ip_per_minute)?,
            ip_burst_per_10s: env_parsed("TOLLGATE_IP_BURST_PER_10S", defaults.ip_burst_per_10s)?,
            user_per_minute: env_parsed("TOLLGATE_USER_PER_MINUTE", defaults.user_per_minute)?,
            generate_per_minute: env_parsed(
                "TOLLGATE_GENERATE_PER_MINUTE",
                defaults.generate_per_minute,
            )?,
            max_concurrent_per_identity: env_parsed(
                "TOLLGATE_MAX_CONCURRENT",
                defaults.max_concurrent_per_identity,
            )?,
            slot_ttl_seconds: env_parsed("TOLLGATE_SLOT_TTL_SECONDS", defaults.slot_ttl_seconds)?,
        })
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: String) -> String {
    env_opt(name).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ApiError> {
    match env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::Internal(format!("invalid value for {name}: {raw}"))),
        None => Ok(default),
    }
}
