//! Core types for tollgate.
//!
//! This crate provides the foundational types used throughout the tollgate
//! usage-control and credit-ledger service:
//!
//! - **Identifiers**: `UserId`, `EntryId`
//! - **Accounts**: `Account`, `SubscriptionStatus`, `PlanType`
//! - **Ledger**: `LedgerEntry`, `EntryKind`
//! - **Payment events**: `PaymentEvent`, `CheckoutSession`, `LineItem`
//!
//! # Credit Unit
//!
//! **1 credit = 1 metered request.** Credits are purchased through the
//! payment provider and stored as `i64` on the account. The ledger is the
//! append-only record of every balance change; the balance field is derived
//! state that only the ledger is allowed to mutate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod event;
pub mod ids;
pub mod ledger;

pub use account::{Account, PlanType, SubscriptionStatus, FREE_DAILY_LIMIT};
pub use error::{CoreError, Result};
pub use event::{CheckoutSession, EventMetadata, LineItem, PaymentEvent, PaymentEventKind};
pub use ids::{EntryId, IdError, UserId};
pub use ledger::{EntryKind, LedgerEntry};
