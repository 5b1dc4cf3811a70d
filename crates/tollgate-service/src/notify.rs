//! Invoice receipt notifications.
//!
//! After credits are applied from a payment event, a receipt is forwarded
//! to an external invoicing endpoint. Delivery is fire-and-forget: the
//! webhook response never waits on it, and failures are logged rather than
//! propagated. The provider's event log remains the source of truth, so a
//! lost receipt is an inconvenience, not an inconsistency.

use std::time::Duration;

use serde::Serialize;

/// Attempts per receipt before giving up.
const NOTIFY_MAX_ATTEMPTS: u32 = 3;

/// Initial pause between attempts; doubles per attempt.
const NOTIFY_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// A receipt for applied credits.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceReceipt {
    /// The credited user.
    pub user_id: String,
    /// Email on the account.
    pub email: String,
    /// Credits applied by the event.
    pub credits_added: i64,
    /// What the customer paid, in cents.
    pub amount_paid_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// The provider's event ID, for reconciliation.
    pub external_event_id: String,
}

/// Fire-and-forget forwarder for invoice receipts.
pub struct InvoiceNotifier {
    client: reqwest::Client,
    url: String,
}

impl InvoiceNotifier {
    /// Create a notifier posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error message if the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Forward a receipt in the background.
    ///
    /// Returns immediately; delivery retries and eventual failure happen in
    /// a spawned task and are only visible in logs.
    pub fn notify(&self, receipt: InvoiceReceipt) {
        let client = self.client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            let mut backoff = NOTIFY_INITIAL_BACKOFF;

            for attempt in 1..=NOTIFY_MAX_ATTEMPTS {
                match client.post(&url).json(&receipt).send().await {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!(
                            event_id = %receipt.external_event_id,
                            attempt,
                            "Invoice receipt delivered"
                        );
                        return;
                    }
                    Ok(response) => {
                        tracing::warn!(
                            event_id = %receipt.external_event_id,
                            status = %response.status(),
                            attempt,
                            "Invoice endpoint rejected receipt"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            event_id = %receipt.external_event_id,
                            error = %e,
                            attempt,
                            "Invoice receipt delivery failed"
                        );
                    }
                }

                if attempt < NOTIFY_MAX_ATTEMPTS {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }

            tracing::error!(
                event_id = %receipt.external_event_id,
                "Giving up on invoice receipt after {NOTIFY_MAX_ATTEMPTS} attempts"
            );
        });
    }
}
