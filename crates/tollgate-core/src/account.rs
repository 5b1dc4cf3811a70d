//! Account and plan types for tollgate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Daily request limit for identities on the free plan.
///
/// Paid identities (credits or active subscription) are effectively
/// unlimited for the period; enforcement happens at the quota check, not
/// here.
pub const FREE_DAILY_LIMIT: u64 = 50;

/// A user account holding the mutable credit balance.
///
/// The balance is derived state: only the ledger's `apply_credit` path may
/// change it, and every change is backed by an append-only `LedgerEntry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account owner.
    pub user_id: UserId,

    /// Email on record, used to validate payment-event metadata.
    pub email: String,

    /// Current credit balance. Never negative.
    pub credits_balance: i64,

    /// Subscription state, driven by provider subscription events.
    pub subscription_status: SubscriptionStatus,

    /// Name of the subscribed plan, if any.
    pub plan_name: Option<String>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance.
    #[must_use]
    pub fn new(user_id: UserId, email: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email,
            credits_balance: 0,
            subscription_status: SubscriptionStatus::None,
            plan_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive the effective plan type from current balance and subscription.
    ///
    /// Credits take precedence over a subscription, which takes precedence
    /// over free.
    #[must_use]
    pub fn plan_type(&self) -> PlanType {
        if self.credits_balance > 0 {
            PlanType::Credits
        } else if self.subscription_status == SubscriptionStatus::Active {
            PlanType::Subscription
        } else {
            PlanType::Free
        }
    }

    /// Daily quota limit for this account's effective plan.
    ///
    /// Returns `None` for paid plans (effectively unlimited for the period).
    #[must_use]
    pub fn daily_limit(&self) -> Option<u64> {
        match self.plan_type() {
            PlanType::Free => Some(FREE_DAILY_LIMIT),
            PlanType::Credits | PlanType::Subscription => None,
        }
    }
}

/// Subscription state for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscription.
    None,
    /// Subscription active and paid.
    Active,
    /// Subscription cancelled or lapsed.
    Cancelled,
}

/// Effective plan derived from account state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// No credits, no subscription.
    Free,
    /// Positive credit balance.
    Credits,
    /// Active subscription.
    Subscription,
}

impl PlanType {
    /// The plan type as a wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Credits => "credits",
            Self::Subscription => "subscription",
        }
    }
}
