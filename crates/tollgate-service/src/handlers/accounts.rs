//! Account handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use tollgate_core::Account;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for account registration.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Email to put on record; payment events are validated against it.
    pub email: String,
}

/// Account representation returned by the API.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// The account owner.
    pub user_id: String,
    /// Email on record.
    pub email: String,
    /// Current credit balance.
    pub credits_balance: i64,
    /// Effective plan derived from balance and subscription.
    pub plan_type: &'static str,
    /// Subscribed plan name, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.user_id.to_string(),
            email: account.email.clone(),
            credits_balance: account.credits_balance,
            plan_type: account.plan_type().as_str(),
            plan_name: account.plan_name,
        }
    }
}

/// Register an account for the calling user.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let user_id = identity.user_id.ok_or(ApiError::Unauthorized)?;

    let email = body.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest(format!("invalid email: {email}")));
    }

    if state.ledger_store.get_account(&user_id)?.is_some() {
        return Err(ApiError::Conflict(format!(
            "account already exists: {user_id}"
        )));
    }

    let account = Account::new(user_id, email);
    state.ledger_store.put_account(&account)?;

    tracing::info!(user_id = %user_id, "Account created");

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Get the calling user's account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<AccountResponse>, ApiError> {
    let user_id = identity.user_id.ok_or(ApiError::Unauthorized)?;

    let account = state
        .ledger_store
        .get_account(&user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {user_id}")))?;

    Ok(Json(account.into()))
}
