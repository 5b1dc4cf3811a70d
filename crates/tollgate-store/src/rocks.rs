//! RocksDB storage implementation.
//!
//! `RocksStore` implements all three storage contracts. Values are CBOR.
//! RocksDB has no per-key TTL, so counters and idempotency records carry an
//! `expires_at` timestamp and expired records are treated as absent on read
//! and reclaimed on the next write.
//!
//! Read-modify-write sequences (increment, set-if-absent, claim) are
//! serialized behind internal mutexes; RocksDB is the single writer for the
//! deployment, so this upholds the atomicity contract globally.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use serde::{Deserialize, Serialize};

use tollgate_core::{Account, EntryId, LedgerEntry, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{CounterStore, EventStatus, IdempotencyStore, LedgerStore};

/// How long a completed idempotency record is retained.
///
/// Payment providers retry failed deliveries for days; the record must
/// outlive the longest retry horizon so redelivery stays a no-op.
const COMPLETED_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A TTL counter value.
#[derive(Debug, Serialize, Deserialize)]
struct CounterEntry {
    value: u64,
    expires_at: DateTime<Utc>,
}

impl CounterEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A stored idempotency record. `Unseen` is never written.
#[derive(Debug, Serialize, Deserialize)]
struct IdempotencyRecord {
    status: EventStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes counter read-modify-write sequences.
    counter_lock: Mutex<()>,
    /// Serializes idempotency claims and transitions.
    idempotency_lock: Mutex<()>,
    /// Serializes balance read-modify-write in `apply_credit`.
    ledger_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            counter_lock: Mutex::new(()),
            idempotency_lock: Mutex::new(()),
            ledger_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_counter_entry(&self, key: &str) -> Result<Option<CounterEntry>> {
        let cf = self.cf(cf::COUNTERS)?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_counter_entry(&self, key: &str, entry: &CounterEntry) -> Result<()> {
        let cf = self.cf(cf::COUNTERS)?;
        let value = Self::serialize(entry)?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_idempotency_record(&self, event_key: &str) -> Result<Option<IdempotencyRecord>> {
        let cf = self.cf(cf::IDEMPOTENCY)?;
        self.db
            .get_cf(&cf, event_key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_idempotency_record(&self, event_key: &str, record: &IdempotencyRecord) -> Result<()> {
        let cf = self.cf(cf::IDEMPOTENCY)?;
        let value = Self::serialize(record)?;
        self.db
            .put_cf(&cf, event_key.as_bytes(), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn ttl_from_now(ttl: Duration) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

impl CounterStore for RocksStore {
    fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let _guard = self.counter_lock.lock().expect("counter lock poisoned");
        let now = Utc::now();

        let entry = match self.get_counter_entry(key)? {
            Some(existing) if !existing.is_expired(now) => CounterEntry {
                value: existing.value + 1,
                expires_at: existing.expires_at,
            },
            // Absent or expired: this increment establishes the window.
            _ => CounterEntry {
                value: 1,
                expires_at: Self::ttl_from_now(ttl),
            },
        };

        self.put_counter_entry(key, &entry)?;
        Ok(entry.value)
    }

    fn get(&self, key: &str) -> Result<u64> {
        let now = Utc::now();
        match self.get_counter_entry(key)? {
            Some(entry) if !entry.is_expired(now) => Ok(entry.value),
            _ => Ok(0),
        }
    }

    fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<()> {
        let _guard = self.counter_lock.lock().expect("counter lock poisoned");
        self.put_counter_entry(
            key,
            &CounterEntry {
                value,
                expires_at: Self::ttl_from_now(ttl),
            },
        )
    }

    fn delete(&self, key: &str) -> Result<()> {
        let cf = self.cf(cf::COUNTERS)?;
        self.db
            .delete_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let _guard = self.counter_lock.lock().expect("counter lock poisoned");
        let now = Utc::now();

        if let Some(existing) = self.get_counter_entry(key)? {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }

        self.put_counter_entry(
            key,
            &CounterEntry {
                value: 1,
                expires_at: Self::ttl_from_now(ttl),
            },
        )?;
        Ok(true)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>> {
        let cf = self.cf(cf::COUNTERS)?;
        let now = Utc::now();
        let mut results = Vec::new();

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(prefix.as_bytes(), rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }

            let entry: CounterEntry = Self::deserialize(&value)?;
            if entry.is_expired(now) {
                continue;
            }

            let key = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            results.push((key, entry.value));
        }

        Ok(results)
    }
}

impl IdempotencyStore for RocksStore {
    fn claim(&self, event_key: &str, ttl: Duration) -> Result<bool> {
        let _guard = self
            .idempotency_lock
            .lock()
            .expect("idempotency lock poisoned");
        let now = Utc::now();

        // A live record in any state blocks the claim. Expired records are
        // reclaimable: a processing claim past its TTL means the holder
        // crashed, and a completed record past retention is forgotten.
        if let Some(record) = self.get_idempotency_record(event_key)? {
            if !record.is_expired(now) {
                return Ok(false);
            }
        }

        self.put_idempotency_record(
            event_key,
            &IdempotencyRecord {
                status: EventStatus::Processing,
                created_at: now,
                updated_at: now,
                expires_at: Self::ttl_from_now(ttl),
            },
        )?;
        Ok(true)
    }

    fn mark_completed(&self, event_key: &str) -> Result<()> {
        let _guard = self
            .idempotency_lock
            .lock()
            .expect("idempotency lock poisoned");

        let record = self.get_idempotency_record(event_key)?.ok_or_else(|| {
            StoreError::NotFound {
                entity: "idempotency record",
                id: event_key.to_string(),
            }
        })?;

        self.put_idempotency_record(
            event_key,
            &IdempotencyRecord {
                status: EventStatus::Completed,
                created_at: record.created_at,
                updated_at: Utc::now(),
                expires_at: Self::ttl_from_now(COMPLETED_RETENTION),
            },
        )
    }

    fn mark_failed(&self, event_key: &str) -> Result<()> {
        let _guard = self
            .idempotency_lock
            .lock()
            .expect("idempotency lock poisoned");
        let cf = self.cf(cf::IDEMPOTENCY)?;
        self.db
            .delete_cf(&cf, event_key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn status(&self, event_key: &str) -> Result<EventStatus> {
        let now = Utc::now();
        match self.get_idempotency_record(event_key)? {
            Some(record) if !record.is_expired(now) => Ok(record.status),
            _ => Ok(EventStatus::Unseen),
        }
    }
}

impl LedgerStore for RocksStore {
    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::BALANCES)?;
        let key = keys::balance_key(&account.user_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let cf = self.cf(cf::BALANCES)?;
        let key = keys::balance_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn apply_credit(&self, entry: &LedgerEntry) -> Result<i64> {
        let _guard = self.ledger_lock.lock().expect("ledger lock poisoned");
        let mut account =
            self.get_account(&entry.user_id)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "account",
                    id: entry.user_id.to_string(),
                })?;

        account.credits_balance += entry.credits_added;
        account.updated_at = Utc::now();

        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_entries = self.cf(cf::ENTRIES)?;
        let cf_by_user = self.cf(cf::ENTRIES_BY_USER)?;

        let balance_key = keys::balance_key(&entry.user_id);
        let entry_key = keys::entry_key(&entry.id);
        let user_entry_key = keys::user_entry_key(&entry.user_id, &entry.id);

        let account_value = Self::serialize(&account)?;
        let entry_value = Self::serialize(entry)?;

        // Entry, index, and balance commit or fail together.
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_entries, &entry_key, &entry_value);
        batch.put_cf(&cf_by_user, &user_entry_key, []);
        batch.put_cf(&cf_balances, &balance_key, &account_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(account.credits_balance)
    }

    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(cf::ENTRIES)?;
        let key = keys::entry_key(entry_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_entries_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_by_user = self.cf(cf::ENTRIES_BY_USER)?;
        let prefix = keys::user_entries_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULIDs sort oldest-first; collect then reverse for newest-first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut entries = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if entries.len() >= limit {
                break;
            }
            let Some(entry_id) = keys::extract_entry_id_from_user_key(&key) else {
                tracing::warn!(key_len = key.len(), "skipping malformed index key");
                continue;
            };
            if let Some(entry) = self.get_entry(&entry_id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (Arc::new(store), dir)
    }

    fn test_account(store: &RocksStore, balance: i64) -> Account {
        let mut account = Account::new(UserId::generate(), "user@example.com".into());
        account.credits_balance = balance;
        store.put_account(&account).unwrap();
        account
    }

    // =========================================================================
    // Counters
    // =========================================================================

    #[test]
    fn increment_establishes_ttl_and_counts() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.increment("rate:ip:1.2.3.4:100", ttl).unwrap(), 1);
        assert_eq!(store.increment("rate:ip:1.2.3.4:100", ttl).unwrap(), 2);
        assert_eq!(store.get("rate:ip:1.2.3.4:100").unwrap(), 2);
        assert_eq!(store.get("rate:ip:1.2.3.4:101").unwrap(), 0);
    }

    #[test]
    fn expired_counter_reads_zero_and_resets_on_increment() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_millis(20);

        assert_eq!(store.increment("quota:u1:2026-01-01", ttl).unwrap(), 1);
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.get("quota:u1:2026-01-01").unwrap(), 0);
        // The next increment starts a fresh window at 1.
        assert_eq!(
            store
                .increment("quota:u1:2026-01-01", Duration::from_secs(60))
                .unwrap(),
            1
        );
    }

    #[test]
    fn concurrent_increments_lose_no_updates() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_secs(60);
        let threads: u64 = 8;
        let per_thread: u64 = 25;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        store.increment("rate:user:u1:77", ttl).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.get("rate:user:u1:77").unwrap(),
            threads * per_thread
        );
    }

    #[test]
    fn set_if_absent_is_exclusive_until_expiry() {
        let (store, _dir) = create_test_store();

        assert!(store
            .set_if_absent("lock:u1:1", Duration::from_millis(30))
            .unwrap());
        assert!(!store
            .set_if_absent("lock:u1:1", Duration::from_secs(60))
            .unwrap());

        std::thread::sleep(Duration::from_millis(50));
        // Expired slot is reclaimable.
        assert!(store
            .set_if_absent("lock:u1:1", Duration::from_secs(60))
            .unwrap());
    }

    #[test]
    fn delete_frees_a_key() {
        let (store, _dir) = create_test_store();

        assert!(store
            .set_if_absent("lock:u1:2", Duration::from_secs(60))
            .unwrap());
        store.delete("lock:u1:2").unwrap();
        assert!(store
            .set_if_absent("lock:u1:2", Duration::from_secs(60))
            .unwrap());
    }

    #[test]
    fn scan_prefix_skips_expired_and_foreign_keys() {
        let (store, _dir) = create_test_store();
        let long = Duration::from_secs(60);

        store.set("quota:a:2026-01-01", 3, long).unwrap();
        store.set("quota:b:2026-01-01", 7, long).unwrap();
        store
            .set("quota:c:2026-01-01", 9, Duration::from_millis(10))
            .unwrap();
        store.set("rate:a:5", 1, long).unwrap();

        std::thread::sleep(Duration::from_millis(30));

        let mut found = store.scan_prefix("quota:").unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("quota:a:2026-01-01".to_string(), 3),
                ("quota:b:2026-01-01".to_string(), 7)
            ]
        );
    }

    // =========================================================================
    // Idempotency
    // =========================================================================

    #[test]
    fn claim_admits_exactly_one_holder() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_secs(60);

        assert!(store.claim("cs_1", ttl).unwrap());
        assert!(!store.claim("cs_1", ttl).unwrap());
        assert_eq!(store.status("cs_1").unwrap(), EventStatus::Processing);
    }

    #[test]
    fn completed_claim_blocks_redelivery() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_secs(60);

        assert!(store.claim("cs_2", ttl).unwrap());
        store.mark_completed("cs_2").unwrap();

        assert_eq!(store.status("cs_2").unwrap(), EventStatus::Completed);
        assert!(!store.claim("cs_2", ttl).unwrap());
    }

    #[test]
    fn failed_claim_allows_retry() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_secs(60);

        assert!(store.claim("cs_3", ttl).unwrap());
        store.mark_failed("cs_3").unwrap();

        assert_eq!(store.status("cs_3").unwrap(), EventStatus::Unseen);
        assert!(store.claim("cs_3", ttl).unwrap());
    }

    #[test]
    fn expired_processing_claim_is_reclaimable() {
        let (store, _dir) = create_test_store();

        assert!(store.claim("cs_4", Duration::from_millis(20)).unwrap());
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.status("cs_4").unwrap(), EventStatus::Unseen);
        assert!(store.claim("cs_4", Duration::from_secs(60)).unwrap());
    }

    #[test]
    fn concurrent_claims_admit_exactly_one_winner() {
        let (store, _dir) = create_test_store();
        let ttl = Duration::from_secs(60);
        let threads = 8;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.claim("cs_race", ttl).unwrap())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|claimed| *claimed)
            .count();

        assert_eq!(winners, 1);
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    #[test]
    fn apply_credit_updates_balance_and_appends_entry() {
        let (store, _dir) = create_test_store();
        let account = test_account(&store, 100);

        let entry =
            LedgerEntry::purchase(account.user_id, 50, "cs_buy".into(), 500, "usd".into());
        let balance = store.apply_credit(&entry).unwrap();
        assert_eq!(balance, 150);

        let stored = store.get_account(&account.user_id).unwrap().unwrap();
        assert_eq!(stored.credits_balance, 150);

        let entries = store
            .list_entries_by_user(&account.user_id, 10, 0)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].credits_added, 50);
        assert_eq!(entries[0].external_event_id, "cs_buy");
    }

    #[test]
    fn apply_credit_unknown_account_fails() {
        let (store, _dir) = create_test_store();
        let entry =
            LedgerEntry::purchase(UserId::generate(), 50, "cs_x".into(), 500, "usd".into());

        assert!(matches!(
            store.apply_credit(&entry),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn list_entries_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let account = test_account(&store, 0);

        let first =
            LedgerEntry::purchase(account.user_id, 10, "cs_a".into(), 100, "usd".into());
        store.apply_credit(&first).unwrap();

        std::thread::sleep(Duration::from_millis(2)); // distinct ULID timestamps

        let second =
            LedgerEntry::purchase(account.user_id, 20, "cs_b".into(), 200, "usd".into());
        store.apply_credit(&second).unwrap();

        let all = store.list_entries_by_user(&account.user_id, 10, 0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].external_event_id, "cs_b"); // newest first
        assert_eq!(all[1].external_event_id, "cs_a");

        let page2 = store.list_entries_by_user(&account.user_id, 1, 1).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].external_event_id, "cs_a");
    }
}
