//! In-process counter store.
//!
//! `MemoryCounterStore` implements the counter contract with a plain map
//! behind a mutex. It is the fallback when the durable backend is
//! unreachable and the deterministic fake for tests. State is lost on
//! restart, which is acceptable only for rate/quota/lock counters — never
//! for ledger or idempotency state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::CounterStore;

#[derive(Debug, Clone)]
struct Slot {
    value: u64,
    expires_at: DateTime<Utc>,
}

/// A process-local `CounterStore` backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryCounterStore {
    inner: Mutex<HashMap<String, Slot>>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expires(ttl: Duration) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let now = Utc::now();

        let slot = inner
            .entry(key.to_string())
            .and_modify(|slot| {
                if slot.expires_at <= now {
                    slot.value = 1;
                    slot.expires_at = Self::expires(ttl);
                } else {
                    slot.value += 1;
                }
            })
            .or_insert_with(|| Slot {
                value: 1,
                expires_at: Self::expires(ttl),
            });

        Ok(slot.value)
    }

    fn get(&self, key: &str) -> Result<u64> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let now = Utc::now();
        Ok(inner
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map_or(0, |slot| slot.value))
    }

    fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.insert(
            key.to_string(),
            Slot {
                value,
                expires_at: Self::expires(ttl),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.remove(key);
        Ok(())
    }

    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let now = Utc::now();

        if let Some(slot) = inner.get(key) {
            if slot.expires_at > now {
                return Ok(false);
            }
        }

        inner.insert(
            key.to_string(),
            Slot {
                value: 1,
                expires_at: Self::expires(ttl),
            },
        );
        Ok(true)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let now = Utc::now();
        Ok(inner
            .iter()
            .filter(|(key, slot)| key.starts_with(prefix) && slot.expires_at > now)
            .map(|(key, slot)| (key.clone(), slot.value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn increment_and_get() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.increment("k", ttl).unwrap(), 1);
        assert_eq!(store.increment("k", ttl).unwrap(), 2);
        assert_eq!(store.get("k").unwrap(), 2);
        assert_eq!(store.get("absent").unwrap(), 0);
    }

    #[test]
    fn expiry_resets_counter() {
        let store = MemoryCounterStore::new();

        store.increment("k", Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.get("k").unwrap(), 0);
        assert_eq!(store.increment("k", Duration::from_secs(60)).unwrap(), 1);
    }

    #[test]
    fn concurrent_increments_lose_no_updates() {
        let store = Arc::new(MemoryCounterStore::new());
        let ttl = Duration::from_secs(60);
        let threads: u64 = 8;
        let per_thread: u64 = 50;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        store.increment("shared", ttl).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("shared").unwrap(), threads * per_thread);
    }

    #[test]
    fn set_if_absent_exclusivity() {
        let store = MemoryCounterStore::new();

        assert!(store.set_if_absent("lock", Duration::from_secs(60)).unwrap());
        assert!(!store.set_if_absent("lock", Duration::from_secs(60)).unwrap());
        store.delete("lock").unwrap();
        assert!(store.set_if_absent("lock", Duration::from_secs(60)).unwrap());
    }

    #[test]
    fn scan_prefix_filters() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(60);

        store.set("quota:a", 1, ttl).unwrap();
        store.set("quota:b", 2, ttl).unwrap();
        store.set("rate:a", 3, ttl).unwrap();

        let mut found = store.scan_prefix("quota:").unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![("quota:a".to_string(), 1), ("quota:b".to_string(), 2)]
        );
    }
}
