//! Storage layer for tollgate.
//!
//! This crate defines the three storage contracts the rest of the system is
//! built on, and provides a RocksDB-backed implementation of all of them
//! plus an in-process fallback for counters.
//!
//! # Contracts
//!
//! - [`CounterStore`]: TTL counters with atomic increment and
//!   set-if-absent. Backs the rate limiter, quota tracker, and concurrency
//!   gate.
//! - [`IdempotencyStore`]: compare-and-set claim records keyed by external
//!   event ID. The exactly-once linchpin for credit application.
//! - [`LedgerStore`]: accounts, append-only ledger entries, and the atomic
//!   `apply_credit` compound operation.
//!
//! # Backends
//!
//! [`RocksStore`] implements all three contracts using column families and
//! `WriteBatch` atomicity. [`MemoryCounterStore`] implements only
//! `CounterStore`: the fallback path exists so that an unreachable durable
//! backend degrades rate limiting instead of taking the service down, but
//! money state (ledger, idempotency) must never live in process memory;
//! that would make financial idempotency per-process instead of global.
//! [`FallbackCounters`] composes the two.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fallback;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use fallback::FallbackCounters;
pub use memory::MemoryCounterStore;
pub use rocks::RocksStore;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tollgate_core::{Account, EntryId, LedgerEntry, UserId};

/// TTL key-value counters with atomic increment.
///
/// Keys are namespaced strings (`rate:*`, `quota:*`, `lock:*`). All
/// mutations are atomic: concurrent increments on the same key never lose
/// an update, and the first increment on an absent or expired key
/// establishes the TTL.
pub trait CounterStore: Send + Sync {
    /// Increment a counter, returning the new value.
    ///
    /// The TTL applies only when this increment creates the window; later
    /// increments inherit the existing expiry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be reached.
    fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Read a counter. Absent or expired keys read as 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn get(&self, key: &str) -> Result<u64>;

    /// Set a counter to an explicit value with a fresh TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<()>;

    /// Delete a counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn delete(&self, key: &str) -> Result<()>;

    /// Atomically create the key with a TTL if no unexpired value exists.
    ///
    /// Returns `true` if this call created the key. This is the concurrency
    /// gate's slot-acquisition primitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// List all unexpired counters under a key prefix.
    ///
    /// Used by the admin usage aggregation.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>>;
}

/// Lifecycle status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// No unexpired record exists for the key.
    Unseen,
    /// A claimant is currently processing the event.
    Processing,
    /// The event was fully applied. Terminal: redelivery is a no-op.
    Completed,
}

/// Durable claim records guaranteeing exactly-once event processing.
///
/// State machine per key: `unseen → processing → completed`, with failure
/// removing the record so the event returns to `unseen` and a provider
/// retry can claim it again.
pub trait IdempotencyStore: Send + Sync {
    /// Atomically claim an event for processing.
    ///
    /// Succeeds only if no unexpired record exists for the key; exactly one
    /// of any set of concurrent claimants wins. The TTL bounds how long a
    /// crashed claimant can block redelivery.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be reached.
    /// Fatal for this path, never degraded to process memory.
    fn claim(&self, event_key: &str, ttl: Duration) -> Result<bool>;

    /// Mark a claimed event as fully applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn mark_completed(&self, event_key: &str) -> Result<()>;

    /// Remove the record so a retried delivery can claim the event again.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn mark_failed(&self, event_key: &str) -> Result<()>;

    /// Current status of an event key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn status(&self, event_key: &str) -> Result<EventStatus>;
}

/// Accounts, the append-only ledger, and the atomic credit application.
pub trait LedgerStore: Send + Sync {
    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Apply a credit: append the entry, update the balance, and maintain
    /// the per-user index in a single atomic write.
    ///
    /// Returns the new balance. Single-write atomicity is what makes a
    /// partially applied credit (entry without balance, or vice versa)
    /// impossible on this backend.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account does not exist.
    fn apply_credit(&self, entry: &LedgerEntry) -> Result<i64>;

    /// Get a ledger entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>>;

    /// List entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    fn list_entries_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;
}
