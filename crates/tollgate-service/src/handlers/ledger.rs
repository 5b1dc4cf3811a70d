//! Ledger history handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::{EntryKind, LedgerEntry};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Pagination parameters.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    /// Page size, capped at [`MAX_PAGE_SIZE`].
    pub limit: Option<usize>,
    /// Entries to skip.
    pub offset: Option<usize>,
}

/// One ledger entry on the wire.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Entry ID.
    pub id: String,
    /// Credits added.
    pub credits_added: i64,
    /// What kind of payment produced the entry.
    pub kind: EntryKind,
    /// The payment-provider event behind the entry.
    pub external_event_id: String,
    /// Amount paid, in cents.
    pub amount_paid_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// Plan name, for subscription entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for EntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            credits_added: entry.credits_added,
            kind: entry.kind,
            external_event_id: entry.external_event_id,
            amount_paid_cents: entry.amount_paid_cents,
            currency: entry.currency,
            plan_name: entry.plan_name,
            created_at: entry.created_at,
        }
    }
}

/// A page of ledger entries.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// Entries, newest first.
    pub entries: Vec<EntryResponse>,
    /// Echoed page size.
    pub limit: usize,
    /// Echoed offset.
    pub offset: usize,
}

/// List the calling user's ledger entries, newest first.
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let user_id = identity.user_id.ok_or(ApiError::Unauthorized)?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let entries = state
        .ledger_store
        .list_entries_by_user(&user_id, limit, offset)?
        .into_iter()
        .map(EntryResponse::from)
        .collect();

    Ok(Json(LedgerResponse {
        entries,
        limit,
        offset,
    }))
}
