//! Key encoding utilities for the RocksDB backend.

use tollgate_core::{EntryId, UserId};

/// Create a balance key from a user ID.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a ledger entry key from an entry ID.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create a user-entry index key.
///
/// Format: `user_id (16 bytes) || entry_id (16 bytes)`
///
/// ULIDs are time-ordered, so entries for a user sort chronologically.
#[must_use]
pub fn user_entry_key(user_id: &UserId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a prefix for iterating all entries for a user.
#[must_use]
pub fn user_entries_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the entry ID from a user-entry index key.
///
/// Returns `None` for keys that are not the expected 32 bytes, so a
/// malformed index row is skipped rather than aborting a listing.
#[must_use]
pub fn extract_entry_id_from_user_key(key: &[u8]) -> Option<EntryId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    Some(EntryId::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_key_length() {
        let user_id = UserId::generate();
        assert_eq!(balance_key(&user_id).len(), 16);
    }

    #[test]
    fn user_entry_key_format() {
        let user_id = UserId::generate();
        let entry_id = EntryId::generate();
        let key = user_entry_key(&user_id, &entry_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], entry_id.to_bytes());
    }

    #[test]
    fn extract_entry_id_roundtrip() {
        let user_id = UserId::generate();
        let entry_id = EntryId::generate();
        let key = user_entry_key(&user_id, &entry_id);

        assert_eq!(extract_entry_id_from_user_key(&key), Some(entry_id));
    }

    #[test]
    fn extract_entry_id_rejects_short_keys() {
        assert_eq!(extract_entry_id_from_user_key(b"short"), None);
        assert_eq!(extract_entry_id_from_user_key(&[0u8; 31]), None);
    }
}
