//! Durable counters with in-process fallback.
//!
//! `FallbackCounters` routes every counter operation to the durable backend
//! first. When that backend reports `StoreError::Unavailable`, the call is
//! retried against a process-local map so rate limiting, quotas, and the
//! concurrency gate keep working instead of taking the whole service down.
//!
//! The fallback is bounded by process lifetime and never authoritative for
//! money. Ledger and idempotency state deliberately have no such wrapper:
//! an unreachable backend on those paths is a hard error.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::memory::MemoryCounterStore;
use crate::CounterStore;

/// A `CounterStore` that degrades to process memory when the durable
/// backend is unreachable.
pub struct FallbackCounters {
    durable: Arc<dyn CounterStore>,
    memory: MemoryCounterStore,
}

impl FallbackCounters {
    /// Wrap a durable counter store.
    #[must_use]
    pub fn new(durable: Arc<dyn CounterStore>) -> Self {
        Self {
            durable,
            memory: MemoryCounterStore::new(),
        }
    }

    fn degrade<T>(
        &self,
        op: &'static str,
        key: &str,
        result: Result<T>,
        fallback: impl FnOnce(&MemoryCounterStore) -> Result<T>,
    ) -> Result<T> {
        match result {
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!(
                    op,
                    key,
                    reason = %reason,
                    "durable counter store unavailable, using in-process fallback"
                );
                fallback(&self.memory)
            }
            other => other,
        }
    }
}

impl CounterStore for FallbackCounters {
    fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        self.degrade("increment", key, self.durable.increment(key, ttl), |m| {
            m.increment(key, ttl)
        })
    }

    fn get(&self, key: &str) -> Result<u64> {
        self.degrade("get", key, self.durable.get(key), |m| m.get(key))
    }

    fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<()> {
        self.degrade("set", key, self.durable.set(key, value, ttl), |m| {
            m.set(key, value, ttl)
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.degrade("delete", key, self.durable.delete(key), |m| m.delete(key))
    }

    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.degrade(
            "set_if_absent",
            key,
            self.durable.set_if_absent(key, ttl),
            |m| m.set_if_absent(key, ttl),
        )
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>> {
        self.degrade("scan_prefix", prefix, self.durable.scan_prefix(prefix), |m| {
            m.scan_prefix(prefix)
        })
    }
}
