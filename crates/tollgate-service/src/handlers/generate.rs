//! The metered generation endpoint.
//!
//! Admission runs in a fixed order: IP rate windows, per-identity window,
//! daily quota, then the concurrency gate. Every check that increments a
//! counter does so before deciding, so rejected attempts still count. Only
//! after all gates pass does the request reach the upstream provider.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use tollgate_core::FREE_DAILY_LIMIT;
use tollgate_limits::Admission;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;
use crate::upstream::UpstreamError;

/// Request body for generation.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// The prompt to complete.
    pub prompt: String,
}

/// A completed generation.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// The provider's completion.
    pub output: String,
    /// Requests counted against today's quota, including this one.
    pub used_today: u64,
    /// Requests left today; `null` when unlimited.
    pub remaining_today: Option<u64>,
}

/// Handle a metered generation request.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".into()));
    }

    // Rate windows. The dual IP window catches bursts; the per-identity
    // window caps registered users who rotate addresses.
    let ip_decision = state.limiter.check_ip(&identity.ip)?;
    if !ip_decision.allowed {
        return Err(ApiError::RateLimited(ip_decision));
    }

    let user_decision = state
        .limiter
        .check_user(identity.key(), state.config.user_per_minute)?;
    if !user_decision.allowed {
        return Err(ApiError::RateLimited(user_decision));
    }

    let endpoint_decision = state.limiter.check_endpoint(
        "generate",
        identity.key(),
        state.config.generate_per_minute,
    )?;
    if !endpoint_decision.allowed {
        return Err(ApiError::RateLimited(endpoint_decision));
    }

    // Daily quota. The attempt is counted before the limit is read, so
    // over-limit probing still consumes budget.
    let used_today = state.quota.increment_daily(identity.key())?;
    let daily_limit = daily_limit_for(&state, &identity)?;
    if let Some(limit) = daily_limit {
        if used_today > limit {
            return Err(ApiError::QuotaExceeded {
                used: used_today,
                limit,
            });
        }
    }

    // Concurrency gate. The permit releases its slot on every exit path
    // below, including error returns.
    let permit = match state.gate.acquire(
        identity.key(),
        state.config.max_concurrent_per_identity,
        state.slot_ttl(),
    )? {
        Admission::Admitted(permit) => permit,
        Admission::Saturated => return Err(ApiError::TooManyConcurrent),
    };

    let upstream = Arc::clone(&state.upstream);
    let prompt = body.prompt.clone();
    let result = state
        .retry_policy
        .run(|| {
            let upstream = Arc::clone(&upstream);
            let prompt = prompt.clone();
            async move { upstream.generate(&prompt).await }
        })
        .await;

    permit.release();

    let output = result.map_err(|e| match e {
        UpstreamError::Timeout => ApiError::UpstreamTimeout,
        UpstreamError::Http(msg) => ApiError::ExternalService(msg),
        UpstreamError::Status(code) => {
            ApiError::ExternalService(format!("upstream returned status {code}"))
        }
    })?;

    Ok(Json(GenerateResponse {
        output,
        used_today,
        remaining_today: daily_limit.map(|limit| limit.saturating_sub(used_today)),
    }))
}

/// Daily budget for the identity: account-derived for registered users,
/// the free limit for everyone else.
fn daily_limit_for(state: &AppState, identity: &Identity) -> Result<Option<u64>, ApiError> {
    match &identity.user_id {
        Some(user_id) => Ok(state
            .ledger_store
            .get_account(user_id)?
            .map_or(Some(FREE_DAILY_LIMIT), |account| account.daily_limit())),
        None => Ok(Some(FREE_DAILY_LIMIT)),
    }
}
