//! Column family names for the RocksDB backend.

/// Column family name constants.
pub mod cf {
    /// TTL counters: rate windows, quota buckets, lock slots.
    pub const COUNTERS: &str = "counters";

    /// Idempotency records keyed by external event ID.
    pub const IDEMPOTENCY: &str = "idempotency";

    /// Ledger entries keyed by `EntryId` (ULID).
    pub const ENTRIES: &str = "entries";

    /// Index for listing ledger entries by user.
    pub const ENTRIES_BY_USER: &str = "entries_by_user";

    /// Account records keyed by `user_id`.
    pub const BALANCES: &str = "balances";
}

/// All column families, for database open.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::COUNTERS,
        cf::IDEMPOTENCY,
        cf::ENTRIES,
        cf::ENTRIES_BY_USER,
        cf::BALANCES,
    ]
}
