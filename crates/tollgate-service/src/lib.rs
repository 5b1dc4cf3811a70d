//! Tollgate HTTP API Service.
//!
//! This crate provides the HTTP API for tollgate, including:
//!
//! - Metered generation behind rate, quota, and concurrency admission
//! - Quota inspection and admin usage reporting
//! - Account registration and ledger history
//! - Payment-provider webhooks with exactly-once credit application
//!
//! # Identity
//!
//! Requests are metered under an identity: registered users present an
//! `x-user-id` header, everyone else is bucketed by a hash of their client
//! IP. Admin endpoints use an `x-admin-key` shared secret.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers are async only for routing

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod notify;
pub mod routes;
pub mod state;
pub mod upstream;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use ledger::{AppliedCredits, CreditLedger, ProcessOutcome};
pub use routes::create_router;
pub use state::AppState;
pub use upstream::{EchoUpstream, HttpUpstream, RetryPolicy, UpstreamClient, UpstreamError};
