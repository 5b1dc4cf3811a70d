//! Error types for tollgate storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    ///
    /// Counter callers degrade to the in-process fallback on this error;
    /// ledger and idempotency callers must surface it, never degrade.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of record was missing.
        entity: &'static str,
        /// The missing key.
        id: String,
    },
}
