//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tollgate_limits::Decision;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A rate window budget was exceeded.
    #[error("rate limit exceeded")]
    RateLimited(Decision),

    /// The daily quota for the identity is exhausted.
    #[error("daily quota exceeded: used={used}, limit={limit}")]
    QuotaExceeded {
        /// Requests counted against today's quota, including this one.
        used: u64,
        /// The daily budget.
        limit: u64,
    },

    /// All concurrency slots for the identity are held.
    #[error("too many concurrent requests")]
    TooManyConcurrent,

    /// Webhook signature missing or failed verification.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Event metadata contradicts stored account state.
    #[error("validation mismatch: {0}")]
    ValidationMismatch(String),

    /// The durable store is unreachable on a path that must not degrade.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The upstream provider did not answer within the deadline.
    #[error("upstream timeout")]
    UpstreamTimeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::RateLimited(decision) => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                self.to_string(),
                Some(serde_json::json!({
                    "limit": decision.limit,
                    "remaining": decision.remaining,
                    "reset_seconds": decision.reset_seconds,
                })),
            ),
            Self::QuotaExceeded { used, limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                self.to_string(),
                Some(serde_json::json!({
                    "used": used,
                    "limit": limit,
                })),
            ),
            Self::TooManyConcurrent => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_concurrent",
                self.to_string(),
                None,
            ),
            Self::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
                None,
            ),
            Self::ValidationMismatch(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_mismatch",
                msg.clone(),
                None,
            ),
            Self::Unavailable(msg) => {
                tracing::error!(error = %msg, "Durable store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    "Service temporarily unavailable".to_string(),
                    None,
                )
            }
            Self::UpstreamTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_timeout",
                self.to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<tollgate_store::StoreError> for ApiError {
    fn from(err: tollgate_store::StoreError) -> Self {
        match err {
            tollgate_store::StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            tollgate_store::StoreError::Unavailable(msg) => Self::Unavailable(msg),
            tollgate_store::StoreError::Database(msg)
            | tollgate_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<tollgate_core::CoreError> for ApiError {
    fn from(err: tollgate_core::CoreError) -> Self {
        match err {
            tollgate_core::CoreError::ValidationMismatch { user_id, field } => {
                Self::ValidationMismatch(format!(
                    "event {field} does not match account state for user {user_id}"
                ))
            }
            tollgate_core::CoreError::MalformedEvent(_)
            | tollgate_core::CoreError::InvalidId(_) => Self::BadRequest(err.to_string()),
        }
    }
}
