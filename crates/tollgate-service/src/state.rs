//! Application state.

use std::sync::Arc;
use std::time::Duration;

use tollgate_limits::{ConcurrencyGate, QuotaTracker, RateLimitConfig, RateLimiter};
use tollgate_store::{CounterStore, FallbackCounters, IdempotencyStore, LedgerStore, RocksStore};

use crate::config::ServiceConfig;
use crate::ledger::CreditLedger;
use crate::notify::InvoiceNotifier;
use crate::upstream::{EchoUpstream, HttpUpstream, RetryPolicy, UpstreamClient};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Account and ledger reads.
    pub ledger_store: Arc<dyn LedgerStore>,

    /// Rate-limit windows, over counters that degrade to process memory
    /// when the durable backend is unreachable.
    pub limiter: RateLimiter,

    /// Daily usage counters, on the same degradable counter path.
    pub quota: QuotaTracker,

    /// Per-identity concurrency slots.
    pub gate: ConcurrencyGate,

    /// Exactly-once credit application. No fallback: money paths fail
    /// loudly when the durable store is down.
    pub credit_ledger: CreditLedger,

    /// The metered upstream provider.
    pub upstream: Arc<dyn UpstreamClient>,

    /// Deadline-and-retry policy for upstream calls.
    pub retry_policy: RetryPolicy,

    /// Invoice receipt forwarder (optional).
    pub notifier: Option<Arc<InvoiceNotifier>>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create application state over an opened store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let upstream: Arc<dyn UpstreamClient> = match &config.upstream_url {
            Some(url) => {
                match HttpUpstream::new(
                    url,
                    config.upstream_api_key.clone(),
                    Duration::from_secs(config.upstream_timeout_seconds),
                ) {
                    Ok(client) => {
                        tracing::info!(upstream_url = %url, "Upstream provider configured");
                        Arc::new(client)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to build upstream client, using echo stub");
                        Arc::new(EchoUpstream)
                    }
                }
            }
            None => {
                tracing::warn!("No upstream configured - generation will echo prompts");
                Arc::new(EchoUpstream)
            }
        };

        Self::with_upstream(store, config, upstream)
    }

    /// `new` with an injected upstream, for tests.
    #[must_use]
    pub fn with_upstream(
        store: Arc<RocksStore>,
        config: ServiceConfig,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        // Counters (rate, quota, locks) degrade to memory when the durable
        // backend is unreachable; ledger and idempotency never do.
        let counters: Arc<dyn CounterStore> = Arc::new(FallbackCounters::new(
            Arc::clone(&store) as Arc<dyn CounterStore>
        ));

        let limiter = RateLimiter::new(
            Arc::clone(&counters),
            RateLimitConfig {
                ip_per_minute: config.ip_per_minute,
                ip_burst_per_10s: config.ip_burst_per_10s,
            },
        );
        let quota = QuotaTracker::new(Arc::clone(&counters));
        let gate = ConcurrencyGate::new(Arc::clone(&counters));

        let credit_ledger = CreditLedger::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::clone(&store) as Arc<dyn IdempotencyStore>,
        );

        let notifier = config.invoice_webhook_url.as_ref().and_then(|url| {
            match InvoiceNotifier::new(url) {
                Ok(notifier) => {
                    tracing::info!(invoice_url = %url, "Invoice notification enabled");
                    Some(Arc::new(notifier))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create invoice notifier");
                    None
                }
            }
        });

        if notifier.is_none() {
            tracing::warn!("Invoice notification not configured - receipts will not be forwarded");
        }

        let retry_policy = RetryPolicy {
            timeout: Duration::from_secs(config.upstream_timeout_seconds),
            ..RetryPolicy::default()
        };

        Self {
            ledger_store: store,
            limiter,
            quota,
            gate,
            credit_ledger,
            upstream,
            retry_policy,
            notifier,
            config,
        }
    }

    /// TTL for concurrency slots, from configuration.
    #[must_use]
    pub fn slot_ttl(&self) -> Duration {
        Duration::from_secs(self.config.slot_ttl_seconds)
    }
}
