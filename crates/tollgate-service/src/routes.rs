//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, admin, generate, health, ledger, quota, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests across all API endpoints. Per-identity
/// limits are enforced by the concurrency gate; this is service-level
/// overload protection.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## API (`x-user-id` identity, anonymous allowed where noted)
/// - `POST /v1/accounts` - Register account
/// - `GET /v1/accounts/me` - Get current account
/// - `POST /v1/generate` - Metered generation (anonymous allowed)
/// - `GET /v1/quota` - Today's usage and limits (anonymous allowed)
/// - `GET /v1/ledger` - Credit history
///
/// ## Admin (`x-admin-key` shared secret)
/// - `GET /admin/usage?date=YYYY-MM-DD` - Per-identity usage report
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/payment` - Payment provider events
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/me", get(accounts::get_account))
        .route("/generate", post(generate::generate))
        .route("/quota", get(quota::get_quota))
        .route("/ledger", get(ledger::list_entries))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limits)
        .route("/health", get(health::health))
        // API v1 routes
        .nest("/v1", api_routes)
        // Admin (shared-secret auth in the extractor)
        .route("/admin/usage", get(admin::usage_report))
        // Webhooks (no rate limit - deliveries are provider-controlled)
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
