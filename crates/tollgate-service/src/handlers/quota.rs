//! Quota inspection handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tollgate_core::{SubscriptionStatus, FREE_DAILY_LIMIT};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

/// Daily usage window for the calling identity.
#[derive(Debug, Serialize)]
pub struct QuotaWindow {
    /// Requests counted today.
    pub today: u64,
    /// Daily budget; `null` means unlimited for the period.
    pub limit: Option<u64>,
    /// Requests left today; `null` when unlimited.
    pub remaining: Option<u64>,
}

/// Current quota standing for the calling identity.
#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    /// Today's usage against the daily budget.
    pub quota: QuotaWindow,
    /// Current credit balance (0 for anonymous identities).
    pub credits: i64,
    /// Subscription standing.
    pub subscription: SubscriptionStatus,
    /// Effective plan.
    pub plan_type: &'static str,
}

/// Report today's usage and limits for the caller.
///
/// Read-only: inspecting the quota never counts against it.
pub async fn get_quota(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<QuotaResponse>, ApiError> {
    let today = state.quota.daily_usage(identity.key())?;

    let account = match &identity.user_id {
        Some(user_id) => state.ledger_store.get_account(user_id)?,
        None => None,
    };

    let (limit, credits, subscription, plan_type) = match account {
        Some(account) => (
            account.daily_limit(),
            account.credits_balance,
            account.subscription_status,
            account.plan_type().as_str(),
        ),
        // Anonymous and unregistered identities are on the free plan.
        None => (Some(FREE_DAILY_LIMIT), 0, SubscriptionStatus::None, "free"),
    };

    Ok(Json(QuotaResponse {
        quota: QuotaWindow {
            today,
            limit,
            remaining: limit.map(|limit| limit.saturating_sub(today)),
        },
        credits,
        subscription,
        plan_type,
    }))
}
