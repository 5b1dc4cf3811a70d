//! HTTP request handlers.

pub mod accounts;
pub mod admin;
pub mod generate;
pub mod health;
pub mod ledger;
pub mod quota;
pub mod webhooks;
