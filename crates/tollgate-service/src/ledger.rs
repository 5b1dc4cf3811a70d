//! Exactly-once credit application.
//!
//! `CreditLedger` sits between the webhook handler and the stores. It owns
//! the idempotency protocol: claim the event, validate it against account
//! state, apply one ledger entry per line item, then mark the claim
//! completed. Failure releases the claim so a provider redelivery can try
//! again; a redelivery of an already-applied event is reported as a
//! duplicate and must not touch the balance.

use std::sync::Arc;
use std::time::Duration;

use tollgate_core::{
    CheckoutSession, CoreError, LedgerEntry, PaymentEventKind, SubscriptionStatus, UserId,
};
use tollgate_store::{EventStatus, IdempotencyStore, LedgerStore};

use crate::error::ApiError;

/// How long a claim blocks redelivery while processing is in flight.
/// Bounds the blackout window left by a crashed claimant.
const PROCESSING_TTL: Duration = Duration::from_secs(5 * 60);

/// Result of processing a payment event.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Credits were applied by this delivery.
    Applied(AppliedCredits),
    /// The event was already processed (or is being processed); nothing
    /// was changed.
    Duplicate,
}

/// Summary of an applied payment event.
#[derive(Debug)]
pub struct AppliedCredits {
    /// The credited user.
    pub user_id: UserId,
    /// Email on the account.
    pub email: String,
    /// Total credits applied across all line items.
    pub credits_added: i64,
    /// Balance after application.
    pub new_balance: i64,
    /// Amount the customer paid, in cents.
    pub amount_paid_cents: i64,
    /// ISO currency code.
    pub currency: String,
}

/// Orchestrates idempotent credit application over the durable stores.
#[derive(Clone)]
pub struct CreditLedger {
    ledger: Arc<dyn LedgerStore>,
    idempotency: Arc<dyn IdempotencyStore>,
}

impl CreditLedger {
    /// Create a ledger over the given stores.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, idempotency: Arc<dyn IdempotencyStore>) -> Self {
        Self { ledger, idempotency }
    }

    /// Process a verified checkout session.
    ///
    /// The session ID is the idempotency key. Exactly one of any set of
    /// concurrent or repeated deliveries applies credits; the rest observe
    /// [`ProcessOutcome::Duplicate`].
    ///
    /// # Errors
    ///
    /// Validation failures (malformed session, unknown account, email
    /// mismatch) map to 4xx and release the claim. Store failures map to
    /// 5xx, also releasing the claim so the provider's retry can land.
    pub fn process_session(
        &self,
        session: &CheckoutSession,
        kind: PaymentEventKind,
    ) -> Result<ProcessOutcome, ApiError> {
        session.validate()?;
        let user_id = session.user_id()?;

        if !self.idempotency.claim(&session.id, PROCESSING_TTL)? {
            match self.idempotency.status(&session.id)? {
                EventStatus::Completed => {
                    tracing::info!(session_id = %session.id, "Duplicate payment event ignored");
                }
                EventStatus::Processing => {
                    tracing::info!(
                        session_id = %session.id,
                        "Payment event already being processed"
                    );
                }
                // Claim lost but no record: the winner failed and released
                // between our calls. Report duplicate; redelivery will win.
                EventStatus::Unseen => {
                    tracing::warn!(session_id = %session.id, "Claim race resolved to unseen");
                }
            }
            return Ok(ProcessOutcome::Duplicate);
        }

        match self.apply_session(session, &user_id, kind) {
            Ok(applied) => {
                self.idempotency.mark_completed(&session.id)?;
                Ok(ProcessOutcome::Applied(applied))
            }
            Err(e) => {
                // Release the claim so a provider retry can reprocess.
                if let Err(release_err) = self.idempotency.mark_failed(&session.id) {
                    tracing::error!(
                        session_id = %session.id,
                        error = %release_err,
                        "Failed to release claim after processing error"
                    );
                }
                Err(e)
            }
        }
    }

    /// Apply the session's line items under an already-held claim.
    fn apply_session(
        &self,
        session: &CheckoutSession,
        user_id: &UserId,
        kind: PaymentEventKind,
    ) -> Result<AppliedCredits, ApiError> {
        let account = self
            .ledger
            .get_account(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("account not found: {user_id}")))?;

        // Metadata email must agree with the account on record. A mismatch
        // means tampered metadata or a misrouted event; never apply.
        if account.email != session.metadata.user_email {
            return Err(CoreError::ValidationMismatch {
                user_id: user_id.to_string(),
                field: "user_email",
            }
            .into());
        }

        let mut credits_added = 0i64;
        let mut new_balance = account.credits_balance;

        for item in &session.line_items {
            // Per-item claim: a redelivery after a partial failure skips
            // items that already produced an entry instead of re-applying.
            let item_key = format!("{}:{}", session.id, item.price_id);
            if !self.idempotency.claim(&item_key, PROCESSING_TTL)? {
                match self.idempotency.status(&item_key)? {
                    EventStatus::Completed => {
                        tracing::info!(
                            session_id = %session.id,
                            price_id = %item.price_id,
                            "Line item already applied, skipping"
                        );
                        continue;
                    }
                    _ => {
                        // Residue of a crashed attempt still inside its TTL.
                        return Err(ApiError::Internal(format!(
                            "line item {item_key} still claimed by an earlier attempt"
                        )));
                    }
                }
            }

            let delta = item.credits * item.quantity;
            let entry = match kind {
                PaymentEventKind::SubscriptionRenewed => LedgerEntry::subscription_renewal(
                    *user_id,
                    delta,
                    session.id.clone(),
                    session.amount_total,
                    session.currency.clone(),
                    session.metadata.plan.clone().unwrap_or_default(),
                ),
                _ => LedgerEntry::purchase(
                    *user_id,
                    delta,
                    session.id.clone(),
                    session.amount_total,
                    session.currency.clone(),
                ),
            };

            match self.ledger.apply_credit(&entry) {
                Ok(balance) => {
                    self.idempotency.mark_completed(&item_key)?;
                    credits_added += delta;
                    new_balance = balance;
                }
                Err(e) => {
                    if let Err(release_err) = self.idempotency.mark_failed(&item_key) {
                        tracing::error!(
                            item_key,
                            error = %release_err,
                            "Failed to release line-item claim"
                        );
                    }
                    return Err(e.into());
                }
            }
        }

        if kind == PaymentEventKind::SubscriptionRenewed {
            self.activate_subscription(user_id, session.metadata.plan.clone())?;
        }

        tracing::info!(
            user_id = %user_id,
            session_id = %session.id,
            credits_added,
            new_balance,
            "Credits applied"
        );

        Ok(AppliedCredits {
            user_id: *user_id,
            email: account.email,
            credits_added,
            new_balance,
            amount_paid_cents: session.amount_total,
            currency: session.currency.clone(),
        })
    }

    /// A paid renewal invoice keeps the subscription active.
    fn activate_subscription(
        &self,
        user_id: &UserId,
        plan_name: Option<String>,
    ) -> Result<(), ApiError> {
        let mut account = self
            .ledger
            .get_account(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("account not found: {user_id}")))?;

        account.subscription_status = SubscriptionStatus::Active;
        if plan_name.is_some() {
            account.plan_name = plan_name;
        }
        account.updated_at = chrono::Utc::now();

        self.ledger.put_account(&account)?;
        Ok(())
    }
}
