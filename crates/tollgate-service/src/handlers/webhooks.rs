//! Payment webhook handler.
//!
//! Contract with the provider: 2xx acknowledges the delivery (including
//! duplicates — redelivery of a processed event must not error), 4xx means
//! the payload itself is bad and retrying is pointless, 5xx asks the
//! provider to redeliver later.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use tollgate_core::{PaymentEvent, PaymentEventKind};

use crate::crypto::verify_signature_header;
use crate::error::ApiError;
use crate::ledger::ProcessOutcome;
use crate::notify::InvoiceReceipt;
use crate::state::AppState;

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the delivery was accepted.
    pub received: bool,
}

/// Handle payment-provider webhooks.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Verify signature if a secret is configured
    if let Some(secret) = &state.config.payment_webhook_secret {
        let signature = headers
            .get("x-payment-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidSignature)?;

        verify_signature_header(&body, signature, secret, chrono::Utc::now().timestamp())
            .map_err(|e| {
                tracing::warn!(error = %e, "Invalid webhook signature");
                ApiError::InvalidSignature
            })?;
    } else {
        // No secret configured - skip verification (development mode)
        tracing::warn!("Webhook secret not configured - skipping signature verification");
    }

    let event: PaymentEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        "Received payment webhook"
    );

    match event.kind() {
        kind @ (PaymentEventKind::CheckoutCompleted | PaymentEventKind::SubscriptionRenewed) => {
            let outcome = state
                .credit_ledger
                .process_session(&event.data.object, kind)?;

            if let ProcessOutcome::Applied(applied) = outcome {
                if let Some(notifier) = &state.notifier {
                    notifier.notify(InvoiceReceipt {
                        user_id: applied.user_id.to_string(),
                        email: applied.email,
                        credits_added: applied.credits_added,
                        amount_paid_cents: applied.amount_paid_cents,
                        currency: applied.currency,
                        external_event_id: event.event_id.clone(),
                    });
                }
            }
        }
        PaymentEventKind::Ignored => {
            tracing::debug!(event_type = %event.event_type, "Unhandled payment event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}
