//! Validated payment-provider event types.
//!
//! The webhook collaborator verifies the signature; this module is the
//! strict typed boundary the raw payload must cross before anything touches
//! the ledger. Payloads that fail structural validation are rejected as
//! `CoreError::MalformedEvent` without any ledger interaction.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::UserId;

/// A verified payment-provider event.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    /// Provider-assigned event ID.
    #[serde(rename = "id")]
    pub event_id: String,

    /// Event type string, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event payload.
    pub data: EventData,
}

/// Container for the event object, matching the provider envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The checkout session the event describes.
    pub object: CheckoutSession,
}

/// Recognized event kinds. Anything else is acknowledged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    /// A checkout session finished; credits were purchased.
    CheckoutCompleted,
    /// A recurring subscription invoice was paid.
    SubscriptionRenewed,
    /// Any event type the ledger does not consume.
    Ignored,
}

impl PaymentEvent {
    /// Classify the event by its type string.
    #[must_use]
    pub fn kind(&self) -> PaymentEventKind {
        match self.event_type.as_str() {
            "checkout.session.completed" => PaymentEventKind::CheckoutCompleted,
            "invoice.paid" => PaymentEventKind::SubscriptionRenewed,
            _ => PaymentEventKind::Ignored,
        }
    }
}

/// A completed checkout session from the payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Provider session ID; the idempotency key for credit application.
    pub id: String,

    /// `payment` for one-time purchases, `subscription` for renewals.
    #[serde(default)]
    pub mode: Option<String>,

    /// Metadata attached at checkout creation.
    pub metadata: EventMetadata,

    /// Total amount paid, in cents.
    pub amount_total: i64,

    /// ISO currency code.
    pub currency: String,

    /// Purchased line items. The collaborator re-fetches these from the
    /// provider API when the webhook payload omits them; by the time the
    /// event reaches the ledger they must be present.
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// Checkout metadata identifying the purchasing user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The purchasing user.
    pub user_id: String,

    /// Email the user checked out with; validated against the account.
    pub user_email: String,

    /// Plan name, present for subscription checkouts.
    #[serde(default)]
    pub plan: Option<String>,
}

/// One purchased line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Provider price identifier.
    pub price_id: String,

    /// Credits this line item grants.
    pub credits: i64,

    /// Quantity purchased.
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

impl CheckoutSession {
    /// Parse and validate the user ID from session metadata.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedEvent` if the metadata user ID is not a
    /// valid UUID.
    pub fn user_id(&self) -> Result<UserId> {
        self.metadata
            .user_id
            .parse()
            .map_err(|_| CoreError::MalformedEvent(format!(
                "metadata user_id is not a UUID: {}",
                self.metadata.user_id
            )))
    }

    /// Validate invariants the deserializer cannot express.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedEvent` when the session carries no line
    /// items, a non-positive amount, or a line item with non-positive
    /// credits or quantity.
    pub fn validate(&self) -> Result<()> {
        if self.line_items.is_empty() {
            return Err(CoreError::MalformedEvent("no line items".into()));
        }
        if self.amount_total < 0 {
            return Err(CoreError::MalformedEvent(format!(
                "negative amount_total: {}",
                self.amount_total
            )));
        }
        for item in &self.line_items {
            if item.credits <= 0 || item.quantity <= 0 {
                return Err(CoreError::MalformedEvent(format!(
                    "non-positive line item: price={} credits={} quantity={}",
                    item.price_id, item.credits, item.quantity
                )));
            }
        }
        Ok(())
    }
}
