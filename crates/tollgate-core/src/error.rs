//! Error types for tollgate core operations.

use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core tollgate operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Event metadata does not match stored account state.
    ///
    /// Raised when the email carried in payment-event metadata disagrees
    /// with the email on record. This is a fatal validation failure, never
    /// retried: a mismatch means the metadata was tampered with or the
    /// event was routed to the wrong account.
    #[error("validation mismatch for {user_id}: {field}")]
    ValidationMismatch {
        /// The affected user.
        user_id: String,
        /// Which field disagreed.
        field: &'static str,
    },

    /// Event payload failed structural validation.
    #[error("malformed payment event: {0}")]
    MalformedEvent(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
