//! Daily usage quotas.
//!
//! A pure counter bucketed by UTC calendar day. Limit enforcement is the
//! caller's responsibility; this component only counts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use tollgate_store::{CounterStore, Result};

use crate::window;

/// Quota keys outlive their day slightly so a request straddling midnight
/// still lands in the right bucket, then self-clean.
const QUOTA_TTL: Duration = Duration::from_secs(25 * 60 * 60);

/// Day-bucketed usage counters over a counter store.
#[derive(Clone)]
pub struct QuotaTracker {
    counters: Arc<dyn CounterStore>,
}

impl QuotaTracker {
    /// Create a tracker over the given store.
    #[must_use]
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    /// Record one unit of usage for today, returning the new count.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn increment_daily(&self, identity: &str) -> Result<u64> {
        self.increment_daily_at(identity, Utc::now())
    }

    /// `increment_daily` with an explicit clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn increment_daily_at(&self, identity: &str, now: DateTime<Utc>) -> Result<u64> {
        let key = quota_key(identity, &window::day_label(now));
        self.counters.increment(&key, QUOTA_TTL)
    }

    /// Today's usage for an identity. Absent keys read as 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn daily_usage(&self, identity: &str) -> Result<u64> {
        self.daily_usage_at(identity, Utc::now())
    }

    /// `daily_usage` with an explicit clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn daily_usage_at(&self, identity: &str, now: DateTime<Utc>) -> Result<u64> {
        let key = quota_key(identity, &window::day_label(now));
        self.counters.get(&key)
    }

    /// All usage counters for a calendar date, keyed by identity.
    ///
    /// Backs the admin usage report.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn usage_for_date(&self, date: NaiveDate) -> Result<BTreeMap<String, u64>> {
        let label = window::day_label_for(date);
        let suffix = format!(":{label}");

        let mut usage = BTreeMap::new();
        for (key, count) in self.counters.scan_prefix("quota:")? {
            if let Some(identity) = key
                .strip_prefix("quota:")
                .and_then(|rest| rest.strip_suffix(&suffix))
            {
                usage.insert(identity.to_string(), count);
            }
        }
        Ok(usage)
    }
}

fn quota_key(identity: &str, day: &str) -> String {
    format!("quota:{identity}:{day}")
}
