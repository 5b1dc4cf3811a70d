//! Authentication and identity extractors.
//!
//! This module provides extractors for:
//! - `Identity` - the billing identity of a request: a registered user via
//!   the `x-user-id` header, or an anonymous identity derived from the
//!   client IP
//! - `AdminAuth` - admin authentication for privileged endpoints

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use tollgate_core::UserId;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// The identity a request is metered under.
///
/// Registered callers present `x-user-id`; everyone else is bucketed by a
/// hash of their client IP so anonymous traffic still gets per-caller
/// limits without storing raw addresses.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The registered user, when the request carried a valid `x-user-id`.
    pub user_id: Option<UserId>,
    /// The client IP as reported by `x-forwarded-for` (first hop).
    pub ip: String,
    /// The key quotas, rate windows and concurrency slots are scoped by.
    key: String,
}

impl Identity {
    /// The counter-key component for this identity.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the request carried no registered user.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ip = client_ip(parts);

        if let Some(raw) = parts.headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
            let user_id = raw
                .parse::<UserId>()
                .map_err(|_| ApiError::BadRequest(format!("invalid x-user-id: {raw}")))?;
            return Ok(Self {
                key: user_id.to_string(),
                user_id: Some(user_id),
                ip,
            });
        }

        Ok(Self {
            key: anonymous_key(&ip),
            user_id: None,
            ip,
        })
    }
}

/// First hop of `x-forwarded-for`, or a fixed bucket when absent.
fn client_ip(parts: &Parts) -> String {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map_or_else(|| "unknown".to_string(), |ip| ip.trim().to_string())
}

/// Stable anonymous identity for an IP: `anon:` plus a truncated hash.
fn anonymous_key(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    format!("anon:{}", &hex::encode(digest)[..16])
}

/// Admin authentication via shared secret.
///
/// Requires the `x-admin-key` header to match the configured admin key.
/// When no key is configured the endpoints are disabled rather than open.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_keys_are_stable_and_scoped() {
        assert_eq!(anonymous_key("1.2.3.4"), anonymous_key("1.2.3.4"));
        assert_ne!(anonymous_key("1.2.3.4"), anonymous_key("5.6.7.8"));
        assert!(anonymous_key("1.2.3.4").starts_with("anon:"));
    }
}
