//! Fixed-window rate limiting.
//!
//! Each check increments the window counter first and compares after, so
//! the attempt itself always counts against the budget. This is deliberate
//! fail-closed accounting: a rejected caller cannot probe for free.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tollgate_store::{CounterStore, Result};

use crate::window;

/// Rate budgets for the dual-window IP check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Coarse per-minute budget per IP.
    pub ip_per_minute: u64,
    /// Fine burst budget per IP per 10 seconds.
    pub ip_burst_per_10s: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_per_minute: 30,
            ip_burst_per_10s: 10,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The budget that was checked.
    pub limit: u64,
    /// Requests left in the window after this one.
    pub remaining: u64,
    /// Seconds until the window rolls over.
    pub reset_seconds: u64,
}

impl Decision {
    fn evaluate(count: u64, limit: u64, reset_seconds: u64) -> Self {
        Self {
            // Equality is within budget; only exceeding it is rejected.
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset_seconds,
        }
    }
}

/// Fixed-window rate limiter over a counter store.
#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter with the given budgets.
    #[must_use]
    pub fn new(counters: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { counters, config }
    }

    /// Check an IP against both the per-minute and burst budgets.
    ///
    /// A request is rejected if it exceeds *either* window; the reported
    /// metadata describes whichever window rejected it (coarse window when
    /// both pass).
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn check_ip(&self, ip: &str) -> Result<Decision> {
        self.check_ip_at(ip, Utc::now())
    }

    /// `check_ip` with an explicit clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn check_ip_at(&self, ip: &str, now: DateTime<Utc>) -> Result<Decision> {
        let coarse_key = format!("rate:ip:{ip}:{}", window::minute_label(now));
        let coarse_count = self
            .counters
            .increment(&coarse_key, Duration::from_secs(window::MINUTE_WINDOW_SECS))?;
        let coarse = Decision::evaluate(
            coarse_count,
            self.config.ip_per_minute,
            window::seconds_to_minute_end(now),
        );

        let burst_key = format!("rate:ipburst:{ip}:{}", window::burst_label(now));
        let burst_count = self
            .counters
            .increment(&burst_key, Duration::from_secs(window::BURST_WINDOW_SECS))?;
        let burst = Decision::evaluate(
            burst_count,
            self.config.ip_burst_per_10s,
            window::seconds_to_burst_end(now),
        );

        if !burst.allowed {
            return Ok(burst);
        }
        Ok(coarse)
    }

    /// Check a user identity against a per-minute budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn check_user(&self, user: &str, per_minute: u64) -> Result<Decision> {
        self.check_user_at(user, per_minute, Utc::now())
    }

    /// `check_user` with an explicit clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn check_user_at(
        &self,
        user: &str,
        per_minute: u64,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let key = format!("rate:user:{user}:{}", window::minute_label(now));
        let count = self
            .counters
            .increment(&key, Duration::from_secs(window::MINUTE_WINDOW_SECS))?;
        Ok(Decision::evaluate(
            count,
            per_minute,
            window::seconds_to_minute_end(now),
        ))
    }

    /// Check an (endpoint, identity) pair against a per-minute budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn check_endpoint(
        &self,
        endpoint: &str,
        identity: &str,
        per_minute: u64,
    ) -> Result<Decision> {
        self.check_endpoint_at(endpoint, identity, per_minute, Utc::now())
    }

    /// `check_endpoint` with an explicit clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn check_endpoint_at(
        &self,
        endpoint: &str,
        identity: &str,
        per_minute: u64,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let key = format!(
            "rate:endpoint:{endpoint}:{identity}:{}",
            window::minute_label(now)
        );
        let count = self
            .counters
            .increment(&key, Duration::from_secs(window::MINUTE_WINDOW_SECS))?;
        Ok(Decision::evaluate(
            count,
            per_minute,
            window::seconds_to_minute_end(now),
        ))
    }
}
