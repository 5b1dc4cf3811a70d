//! Bounded-slot concurrency admission.
//!
//! Each identity gets `max_slots` admission permits, held as TTL keys
//! `lock:{identity}:{slot}` in the counter store. Acquisition probes the
//! candidate slots with set-if-absent; the first write that lands wins the
//! slot. Slots are unordered — no FIFO fairness, and starvation under
//! sustained saturation is an accepted limitation.
//!
//! Release happens on every exit path: [`SlotPermit`] deletes its key on
//! drop, and the TTL reclaims slots whose holder died without dropping.

use std::sync::Arc;
use std::time::Duration;

use tollgate_store::{CounterStore, Result, StoreError};

/// Outcome of an admission attempt.
pub enum Admission {
    /// A slot was acquired (or the gate failed open); the permit releases
    /// it when dropped.
    Admitted(SlotPermit),
    /// All slots for the identity are currently held.
    Saturated,
}

/// Bounded-slot admission gate over a counter store.
#[derive(Clone)]
pub struct ConcurrencyGate {
    locks: Arc<dyn CounterStore>,
}

impl ConcurrencyGate {
    /// Create a gate over the given lock store.
    #[must_use]
    pub fn new(locks: Arc<dyn CounterStore>) -> Self {
        Self { locks }
    }

    /// Try to acquire one of `max_slots` permits for an identity.
    ///
    /// The TTL bounds how long a crashed holder can keep a slot; it is the
    /// safety net, not the primary release mechanism. An unreachable lock
    /// store fails open: the request is admitted without a slot rather
    /// than denied on an unrelated backend error.
    ///
    /// # Errors
    ///
    /// Returns an error only for non-availability store failures.
    pub fn acquire(&self, identity: &str, max_slots: u32, ttl: Duration) -> Result<Admission> {
        for slot in 1..=max_slots {
            let key = format!("lock:{identity}:{slot}");
            match self.locks.set_if_absent(&key, ttl) {
                Ok(true) => {
                    tracing::debug!(identity, slot, "concurrency slot acquired");
                    return Ok(Admission::Admitted(SlotPermit {
                        locks: Arc::clone(&self.locks),
                        key: Some(key),
                    }));
                }
                Ok(false) => {}
                Err(StoreError::Unavailable(reason)) => {
                    tracing::warn!(
                        identity,
                        reason = %reason,
                        "lock store unavailable, admitting without a slot"
                    );
                    return Ok(Admission::Admitted(SlotPermit {
                        locks: Arc::clone(&self.locks),
                        key: None,
                    }));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(identity, max_slots, "all concurrency slots held");
        Ok(Admission::Saturated)
    }
}

/// A held admission slot. Dropping the permit releases the slot.
pub struct SlotPermit {
    locks: Arc<dyn CounterStore>,
    /// `None` when the gate failed open; release is then a no-op.
    key: Option<String>,
}

impl SlotPermit {
    /// Release the slot explicitly. Equivalent to dropping the permit.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(key) = self.key.take() {
            // Best effort: the TTL reclaims the slot if this delete fails.
            if let Err(e) = self.locks.delete(&key) {
                tracing::warn!(key, error = %e, "failed to release concurrency slot");
            }
        }
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_store::MemoryCounterStore;

    fn gate() -> ConcurrencyGate {
        ConcurrencyGate::new(Arc::new(MemoryCounterStore::new()))
    }

    const TTL: Duration = Duration::from_secs(30);

    fn admitted(admission: Result<Admission>) -> Option<SlotPermit> {
        match admission.unwrap() {
            Admission::Admitted(permit) => Some(permit),
            Admission::Saturated => None,
        }
    }

    #[test]
    fn at_most_max_slots_are_held() {
        let gate = gate();

        let first = admitted(gate.acquire("u1", 2, TTL));
        let second = admitted(gate.acquire("u1", 2, TTL));
        let third = admitted(gate.acquire("u1", 2, TTL));

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none());
    }

    #[test]
    fn release_frees_a_slot() {
        let gate = gate();

        let first = admitted(gate.acquire("u1", 1, TTL)).unwrap();
        assert!(admitted(gate.acquire("u1", 1, TTL)).is_none());

        first.release();
        assert!(admitted(gate.acquire("u1", 1, TTL)).is_some());
    }

    #[test]
    fn drop_releases_like_an_explicit_release() {
        let gate = gate();

        {
            let _permit = admitted(gate.acquire("u1", 1, TTL)).unwrap();
            assert!(admitted(gate.acquire("u1", 1, TTL)).is_none());
        } // permit dropped here

        assert!(admitted(gate.acquire("u1", 1, TTL)).is_some());
    }

    #[test]
    fn expired_slot_is_reclaimed_without_release() {
        let gate = gate();

        let permit = admitted(gate.acquire("u1", 1, Duration::from_millis(20))).unwrap();
        // Simulate a crashed holder: leak the permit so drop never runs.
        std::mem::forget(permit);

        assert!(admitted(gate.acquire("u1", 1, TTL)).is_none());
        std::thread::sleep(Duration::from_millis(40));
        assert!(admitted(gate.acquire("u1", 1, TTL)).is_some());
    }

    #[test]
    fn identities_have_independent_slots() {
        let gate = gate();

        let _a = admitted(gate.acquire("u1", 1, TTL)).unwrap();
        assert!(admitted(gate.acquire("u2", 1, TTL)).is_some());
    }

    #[test]
    fn three_concurrent_acquires_for_two_slots() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
        let gate = ConcurrencyGate::new(store);
        let barrier = Arc::new(std::sync::Barrier::new(3));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = gate.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    match gate.acquire("u1", 2, TTL).unwrap() {
                        Admission::Admitted(permit) => {
                            // Keep the slot held so later attempts see it.
                            std::mem::forget(permit);
                            true
                        }
                        Admission::Saturated => false,
                    }
                })
            })
            .collect();

        let admitted_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted_count, 2);
    }

    #[test]
    fn fails_open_when_lock_store_is_unavailable() {
        struct DownStore;

        impl CounterStore for DownStore {
            fn increment(&self, _: &str, _: Duration) -> Result<u64> {
                Err(StoreError::Unavailable("down".into()))
            }
            fn get(&self, _: &str) -> Result<u64> {
                Err(StoreError::Unavailable("down".into()))
            }
            fn set(&self, _: &str, _: u64, _: Duration) -> Result<()> {
                Err(StoreError::Unavailable("down".into()))
            }
            fn delete(&self, _: &str) -> Result<()> {
                Err(StoreError::Unavailable("down".into()))
            }
            fn set_if_absent(&self, _: &str, _: Duration) -> Result<bool> {
                Err(StoreError::Unavailable("down".into()))
            }
            fn scan_prefix(&self, _: &str) -> Result<Vec<(String, u64)>> {
                Err(StoreError::Unavailable("down".into()))
            }
        }

        let gate = ConcurrencyGate::new(Arc::new(DownStore));
        // Admitted without a slot; dropping the permit must not error.
        assert!(admitted(gate.acquire("u1", 2, TTL)).is_some());
    }
}
