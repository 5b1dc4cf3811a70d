//! Ledger entry types for tollgate.
//!
//! Every credit-affecting change is recorded as an immutable `LedgerEntry`.
//! Entries are append-only; the account balance is the running sum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, UserId};

/// An immutable record of one credit application.
///
/// One entry exists per successfully processed payment line item. Entries
/// use ULIDs so a per-user index scan returns them in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The user whose balance was credited.
    pub user_id: UserId,

    /// Credits added. Always positive.
    pub credits_added: i64,

    /// What kind of payment produced this entry.
    pub kind: EntryKind,

    /// The payment-provider event that drove this entry.
    ///
    /// For a given `(external_event_id, price_id)` pair at most one entry
    /// exists; the idempotency cache enforces this upstream.
    pub external_event_id: String,

    /// Amount paid to the provider, in cents.
    pub amount_paid_cents: i64,

    /// ISO currency code of the payment.
    pub currency: String,

    /// Plan name from event metadata, if any.
    pub plan_name: Option<String>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry for a one-time credit purchase.
    #[must_use]
    pub fn purchase(
        user_id: UserId,
        credits_added: i64,
        external_event_id: String,
        amount_paid_cents: i64,
        currency: String,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            credits_added,
            kind: EntryKind::Purchase,
            external_event_id,
            amount_paid_cents,
            currency,
            plan_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create an entry for a subscription renewal grant.
    #[must_use]
    pub fn subscription_renewal(
        user_id: UserId,
        credits_added: i64,
        external_event_id: String,
        amount_paid_cents: i64,
        currency: String,
        plan_name: String,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            credits_added,
            kind: EntryKind::SubscriptionRenewal,
            external_event_id,
            amount_paid_cents,
            currency,
            plan_name: Some(plan_name),
            created_at: Utc::now(),
        }
    }
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// One-time credit purchase.
    Purchase,

    /// Recurring subscription renewal grant.
    SubscriptionRenewal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_entry() {
        let user_id = UserId::generate();
        let entry =
            LedgerEntry::purchase(user_id, 50, "cs_test_123".into(), 500, "usd".into());

        assert_eq!(entry.credits_added, 50);
        assert_eq!(entry.kind, EntryKind::Purchase);
        assert_eq!(entry.external_event_id, "cs_test_123");
        assert!(entry.plan_name.is_none());
    }

    #[test]
    fn renewal_entry_carries_plan() {
        let user_id = UserId::generate();
        let entry = LedgerEntry::subscription_renewal(
            user_id,
            500,
            "in_test_456".into(),
            2000,
            "usd".into(),
            "pro".into(),
        );

        assert_eq!(entry.kind, EntryKind::SubscriptionRenewal);
        assert_eq!(entry.plan_name.as_deref(), Some("pro"));
    }
}
