//! Admin handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for the usage report.
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    /// UTC calendar date, `YYYY-MM-DD`.
    pub date: String,
}

/// Usage report for one calendar date.
#[derive(Debug, Serialize)]
pub struct UsageReport {
    /// The reported date.
    pub date: String,
    /// Total requests across all identities.
    pub total_requests: u64,
    /// Per-identity request counts.
    pub usage: BTreeMap<String, u64>,
}

/// Report per-identity usage for a calendar date.
pub async fn usage_report(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageReport>, ApiError> {
    let date = query
        .date
        .parse::<NaiveDate>()
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {}", query.date)))?;

    let usage = state.quota.usage_for_date(date)?;
    let total_requests = usage.values().sum();

    tracing::info!(
        admin_id = %admin.admin_id,
        date = %date,
        identities = usage.len(),
        "Usage report served"
    );

    Ok(Json(UsageReport {
        date: query.date,
        total_requests,
        usage,
    }))
}
